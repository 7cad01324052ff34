use serde::{Deserialize, Serialize};

/// Versioned rule data for the deterministic pre-filter.
///
/// The built-in lists (`Default`) are the production rules; operators can
/// load a tuned replacement from JSON without a rebuild, and tests inject
/// small fixtures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub version: String,
    /// Domains that are never job-related (consumer platforms, dev tools).
    #[serde(default)]
    pub noise_domains: Vec<String>,
    /// Subject substrings that definitively indicate noise.
    #[serde(default)]
    pub noise_subject_keywords: Vec<String>,
    /// Job-platform domains whose mail is job-related a priori.
    #[serde(default)]
    pub trusted_domains: Vec<String>,
    /// Sender-level rules for the social network that mixes hiring mail
    /// with social noise on a single domain.
    #[serde(default)]
    pub social: SocialRules,
    /// Case-insensitive regexes matching job-alert/marketing subjects.
    /// These demote otherwise-trusted senders to noise.
    #[serde(default)]
    pub alert_subject_patterns: Vec<String>,
}

/// Per-sender rules for a domain where only specific senders confirm a
/// real application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialRules {
    pub domain: String,
    /// Social notifications: invitations, messages, feed updates.
    #[serde(default)]
    pub noise_senders: Vec<String>,
    /// Job alerts and suggestions; not confirmed applications.
    #[serde(default)]
    pub alert_senders: Vec<String>,
    /// Senders that confirm an application was actually submitted.
    #[serde(default)]
    pub application_senders: Vec<String>,
}

impl Default for SocialRules {
    fn default() -> Self {
        Self {
            domain: "linkedin.com".to_string(),
            noise_senders: vec![
                "updates-noreply@linkedin.com".to_string(),
                "invitations@linkedin.com".to_string(),
                "messages-noreply@linkedin.com".to_string(),
                "notifications-noreply@linkedin.com".to_string(),
                "newsletters-noreply@linkedin.com".to_string(),
            ],
            alert_senders: vec![
                "jobs-listings@linkedin.com".to_string(),
                "jobalerts-noreply@linkedin.com".to_string(),
            ],
            application_senders: vec!["jobs-noreply@linkedin.com".to_string()],
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            noise_domains: vec![
                "google.com",
                "gmail.com",
                "microsoft.com",
                "outlook.com",
                "hotmail.com",
                "amazon.com",
                "apple.com",
                "facebook.com",
                "instagram.com",
                "twitter.com",
                "x.com",
                "youtube.com",
                "netflix.com",
                "spotify.com",
                "airbnb.com",
                "paypal.com",
                "stripe.com",
                "notion.so",
                "slack.com",
                "github.com",
                "gitlab.com",
                "atlassian.com",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            noise_subject_keywords: vec![
                "newsletter",
                "offre du moment",
                "promotion",
                "promo",
                "soldes",
                "réduction",
                "remise",
                "% de réduction",
                "commande",
                "livraison",
                "suivi de colis",
                "facture",
                "reçu",
                "paiement",
                "abonnement",
                "compte rendu",
                "verification",
                "vérification",
                "mot de passe",
                "password",
                "2fa",
                "code de sécurité",
                "bienvenue sur",
                "welcome to",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            trusted_domains: vec![
                "hellowork.com",
                "reply.hellowork.com",
                "indeed.com",
                "match.indeed.com",
                "jobalert.indeed.com",
                "welcometothejungle.com",
                "monster.fr",
                "monster.com",
                "apec.fr",
                "pole-emploi.fr",
                "francetravail.fr",
                "glassdoor.com",
                "glassdoor.fr",
                "talent.io",
                "mytalentplug.com",
                "jobteaser.com",
                "cadremploi.fr",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            social: SocialRules::default(),
            alert_subject_patterns: vec![
                r"^\d+ nouvel(le)?s? emploi",
                r"et \d+ nouveau(x)? poste",
                r"jobs? similar to",
                r"is hiring a ",
                r"is hiring an ",
                r"recherche un/e ",
                r"land a job",
                r"démarquez-vous en envoyant",
                r"sont désormais synchronisés",
                r"est toujours disponible",
                r"postulez sans tarder",
                r"your profile is getting",
                r"thanks for being a valued member",
                r"share their thoughts",
                r"you may know",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}
