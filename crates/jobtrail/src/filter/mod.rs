//! Deterministic pre-filter: decides from (sender, subject) alone whether
//! a message is trusted job mail, known noise, or needs AI classification.
//!
//! Pure and side-effect-free; the same input always yields the same
//! verdict. Every message the filter resolves here is one paid
//! classification call saved.

use regex::{Regex, RegexBuilder};

use crate::config::{FilterConfig, SocialRules};

/// Filter outcome for a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Known job platform; relevance is settled, only extraction remains.
    Trusted,
    /// Known noise; never reaches the AI tier.
    Noise,
    /// Unrecognized sender; the AI decides relevance.
    Unknown,
}

/// A decision plus a human-readable reason, for logs only.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub decision: Decision,
    pub reason: String,
}

impl Verdict {
    fn trusted(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Trusted,
            reason: reason.into(),
        }
    }

    fn noise(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Noise,
            reason: reason.into(),
        }
    }

    fn unknown(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Unknown,
            reason: reason.into(),
        }
    }
}

/// Rule engine built from a [`FilterConfig`]. Regex patterns are compiled
/// once at construction; string lists are lower-cased once.
pub struct PreFilter {
    noise_domains: Vec<String>,
    noise_keywords: Vec<String>,
    trusted_domains: Vec<String>,
    social: SocialRules,
    /// Pre-compiled case-insensitive alert-subject patterns.
    alert_patterns: Vec<Regex>,
}

impl PreFilter {
    pub fn new(config: FilterConfig) -> Self {
        let alert_patterns = config
            .alert_subject_patterns
            .iter()
            .filter_map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .ok()
            })
            .collect();

        let mut social = config.social;
        social.domain = social.domain.to_lowercase();
        for list in [
            &mut social.noise_senders,
            &mut social.alert_senders,
            &mut social.application_senders,
        ] {
            for sender in list.iter_mut() {
                *sender = sender.to_lowercase();
            }
        }

        Self {
            noise_domains: lowercase_all(config.noise_domains),
            noise_keywords: lowercase_all(config.noise_subject_keywords),
            trusted_domains: lowercase_all(config.trusted_domains),
            social,
            alert_patterns,
        }
    }

    /// Classifies a message by its `From` header and subject. Rules are
    /// ordered; the first match wins.
    pub fn classify(&self, from: &str, subject: &str) -> Verdict {
        let address = extract_address(from);
        let domain = extract_domain(&address);
        let lower_subject = subject.to_lowercase();

        // Known noise domains take precedence over everything.
        for noise_domain in &self.noise_domains {
            if domain_matches(domain, noise_domain) {
                return Verdict::noise(format!("known noise domain: {}", noise_domain));
            }
        }

        if let Some(keyword) = self
            .noise_keywords
            .iter()
            .find(|kw| lower_subject.contains(kw.as_str()))
        {
            return Verdict::noise(format!("noise subject keyword: \"{}\"", keyword));
        }

        // The social network mixes hiring mail and social noise on one
        // domain, so it is resolved per sender, default-deny.
        if domain_matches(domain, &self.social.domain) {
            return self.classify_social(&address, subject);
        }

        for trusted_domain in &self.trusted_domains {
            if domain_matches(domain, trusted_domain) {
                // Trusted platforms still send job alerts and marketing.
                if self.matches_alert_subject(subject) {
                    return Verdict::noise(format!(
                        "job alert from trusted platform: \"{}\"",
                        subject
                    ));
                }
                return Verdict::trusted(format!("trusted job platform: {}", trusted_domain));
            }
        }

        Verdict::unknown(format!("unrecognized domain: {}", domain))
    }

    fn classify_social(&self, address: &str, subject: &str) -> Verdict {
        if self.social.noise_senders.iter().any(|s| s == address) {
            return Verdict::noise(format!("social noise sender: {}", address));
        }
        if self.social.alert_senders.iter().any(|s| s == address) {
            return Verdict::noise(format!("job alert sender (not an application): {}", address));
        }
        if self.social.application_senders.iter().any(|s| s == address) {
            if self.matches_alert_subject(subject) {
                return Verdict::noise(format!("job alert subject: \"{}\"", subject));
            }
            return Verdict::trusted(format!("application confirmation sender: {}", address));
        }
        Verdict::noise(format!("unlisted social sender: {}", address))
    }

    fn matches_alert_subject(&self, subject: &str) -> bool {
        self.alert_patterns.iter().any(|p| p.is_match(subject))
    }
}

impl Default for PreFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

fn lowercase_all(items: Vec<String>) -> Vec<String> {
    items.into_iter().map(|s| s.to_lowercase()).collect()
}

/// Pulls the bare address out of a `From` header:
/// `"LinkedIn <jobs-noreply@linkedin.com>"` → `jobs-noreply@linkedin.com`.
fn extract_address(from: &str) -> String {
    if let (Some(start), Some(end)) = (from.find('<'), from.rfind('>')) {
        if start < end {
            return from[start + 1..end].trim().to_lowercase();
        }
    }
    from.trim().to_lowercase()
}

/// The part after the last `@`, or the whole string when there is none.
fn extract_domain(address: &str) -> &str {
    match address.rfind('@') {
        Some(idx) => &address[idx + 1..],
        None => address,
    }
}

/// Exact match or subdomain match (`reply.hellowork.com` matches
/// `hellowork.com`).
fn domain_matches(domain: &str, entry: &str) -> bool {
    domain == entry || domain.ends_with(&format!(".{}", entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> PreFilter {
        PreFilter::default()
    }

    #[test]
    fn test_classify_is_deterministic() {
        let f = filter();
        let first = f.classify("Acme <careers@acme.io>", "Your application");
        let second = f.classify("Acme <careers@acme.io>", "Your application");
        assert_eq!(first.decision, second.decision);
        assert_eq!(first.reason, second.reason);
    }

    #[test]
    fn test_noise_domain() {
        let v = filter().classify("Notion <newsletter@notion.so>", "Your weekly digest");
        assert_eq!(v.decision, Decision::Noise);
        assert!(v.reason.contains("notion.so"));
    }

    #[test]
    fn test_noise_domain_subdomain_match() {
        let v = filter().classify("no-reply@mail.github.com", "New release");
        assert_eq!(v.decision, Decision::Noise);
    }

    #[test]
    fn test_noise_domain_precedes_trusted_subject() {
        // A noise-domain sender stays noise even with a hiring-sounding
        // subject: the domain check runs first.
        let v = filter().classify(
            "Spotify <noreply@spotify.com>",
            "Your application was sent to Acme",
        );
        assert_eq!(v.decision, Decision::Noise);
        assert!(v.reason.contains("noise domain"));
    }

    #[test]
    fn test_noise_subject_keyword() {
        let v = filter().classify("someone@smallshop.fr", "Votre facture de mars");
        assert_eq!(v.decision, Decision::Noise);
        assert!(v.reason.contains("facture"));
    }

    #[test]
    fn test_social_application_sender_is_trusted() {
        let v = filter().classify(
            "LinkedIn <jobs-noreply@linkedin.com>",
            "Your application was sent to Acme",
        );
        assert_eq!(v.decision, Decision::Trusted);
    }

    #[test]
    fn test_social_alert_sender_is_always_noise() {
        let f = filter();
        for subject in ["Your application was sent to Acme", "anything at all"] {
            let v = f.classify("jobalerts-noreply@linkedin.com", subject);
            assert_eq!(v.decision, Decision::Noise, "subject: {}", subject);
        }
    }

    #[test]
    fn test_social_noise_sender() {
        let v = filter().classify("invitations@linkedin.com", "John wants to connect");
        assert_eq!(v.decision, Decision::Noise);
    }

    #[test]
    fn test_social_application_sender_with_alert_subject_is_noise() {
        let v = filter().classify(
            "jobs-noreply@linkedin.com",
            "New jobs similar to Software Engineer",
        );
        assert_eq!(v.decision, Decision::Noise);
        assert!(v.reason.contains("alert subject"));
    }

    #[test]
    fn test_social_unlisted_sender_defaults_to_noise() {
        let v = filter().classify("random-product@linkedin.com", "Check this out");
        assert_eq!(v.decision, Decision::Noise);
        assert!(v.reason.contains("unlisted"));
    }

    #[test]
    fn test_trusted_platform() {
        let v = filter().classify(
            "HelloWork <notification@hellowork.com>",
            "Votre candidature a bien été envoyée",
        );
        assert_eq!(v.decision, Decision::Trusted);
    }

    #[test]
    fn test_trusted_platform_subdomain() {
        let v = filter().classify("r-c-abc123@reply.hellowork.com", "Candidature transmise");
        assert_eq!(v.decision, Decision::Trusted);
    }

    #[test]
    fn test_trusted_platform_alert_subject_is_noise() {
        let v = filter().classify(
            "Indeed <alert@indeed.com>",
            "3 nouveaux emplois pour vous",
        );
        assert_eq!(v.decision, Decision::Noise);
    }

    #[test]
    fn test_unknown_sender() {
        let v = filter().classify("Acme Recruiting <careers@acme.io>", "Interview invitation");
        assert_eq!(v.decision, Decision::Unknown);
        assert!(v.reason.contains("acme.io"));
    }

    #[test]
    fn test_address_extraction_without_brackets() {
        let v = filter().classify("newsletter@notion.so", "Hello");
        assert_eq!(v.decision, Decision::Noise);
    }

    #[test]
    fn test_sender_matching_is_case_insensitive() {
        let v = filter().classify(
            "LinkedIn <JOBS-NOREPLY@LinkedIn.com>",
            "Your application was sent to Acme",
        );
        assert_eq!(v.decision, Decision::Trusted);
    }

    #[test]
    fn test_empty_rule_set_yields_unknown() {
        let config = FilterConfig {
            version: "1.0".to_string(),
            noise_domains: vec![],
            noise_subject_keywords: vec![],
            trusted_domains: vec![],
            social: SocialRules {
                domain: "social.example".to_string(),
                noise_senders: vec![],
                alert_senders: vec![],
                application_senders: vec![],
            },
            alert_subject_patterns: vec![],
        };
        let f = PreFilter::new(config);
        let v = f.classify("anyone@anywhere.com", "Anything");
        assert_eq!(v.decision, Decision::Unknown);
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let config = FilterConfig {
            alert_subject_patterns: vec!["[unclosed".to_string(), "valid".to_string()],
            ..FilterConfig::default()
        };
        let f = PreFilter::new(config);
        // The bad pattern is dropped; the good one still demotes.
        let v = f.classify("alert@indeed.com", "something valid here");
        assert_eq!(v.decision, Decision::Noise);
    }
}
