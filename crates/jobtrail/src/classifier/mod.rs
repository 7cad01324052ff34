//! AI classification tier.
//!
//! Two entry points share one retried transport call: [`Classifier::extract_trusted`]
//! for messages the pre-filter already resolved as job-related, and
//! [`Classifier::classify_unknown`] for everything the rules could not
//! decide. The classifier never lets a transport fault escape as an
//! error, with one exception: daily-quota exhaustion, which the caller
//! must see so it can stop burning the rest of the batch.

pub mod groq;
pub mod pacer;
pub mod prompt;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::Status;

pub use groq::GroqClient;
pub use pacer::Pacer;
pub use transport::{CompletionTransport, TransportError};

/// Placeholder when the model cannot name the position.
const UNSPECIFIED_POSITION: &str = "Unspecified";

/// Placeholder company when nothing can be extracted from the sender.
const UNKNOWN_COMPANY: &str = "Unknown";

/// Display names that identify the platform rather than the employer.
const GENERIC_SENDER_NAMES: &[&str] = &["linkedin", "indeed"];

/// Result of classifying one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub company: String,
    pub position: String,
    pub status: Status,
    pub confidence: f32,
    pub is_job_related: bool,
}

impl Classification {
    /// Sentinel for a message the model judged unrelated to any job
    /// application. Must never be persisted as an application.
    fn not_job_related() -> Self {
        Self {
            company: "N/A".to_string(),
            position: "N/A".to_string(),
            status: Status::Sent,
            confidence: 0.0,
            is_job_related: false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ClassifyError {
    /// The backend's daily quota is spent; further calls are certain to
    /// fail, so the batch should stop here.
    #[error("daily completion quota exhausted")]
    QuotaExhausted,
}

/// Tuning knobs for retry, pacing and truncation.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Retry bound for throttle-class rate limits.
    pub max_retries: u32,
    /// First backoff step when the backend suggests no delay; doubles
    /// per attempt.
    pub base_backoff: Duration,
    /// A suggested retry delay at or above this is treated as daily-quota
    /// exhaustion rather than a throttle.
    pub quota_delay_threshold: Duration,
    /// Minimum spacing between transport calls.
    pub min_call_interval: Duration,
    /// Body prefix sent for trusted extraction.
    pub trusted_body_limit: usize,
    /// Body prefix sent for unknown classification. Larger, because the
    /// model also has to answer the relevance question.
    pub unknown_body_limit: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_secs(10),
            quota_delay_threshold: Duration::from_secs(300),
            min_call_interval: Duration::from_secs(5),
            trusted_body_limit: 1500,
            unknown_body_limit: 3000,
        }
    }
}

/// Shape of the JSON the model is instructed to return.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default)]
    is_job_related: Option<bool>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Outcome of the retried transport call, before coercion.
enum CallFailure {
    QuotaExhausted,
    Degraded(String),
}

/// Classification gateway over a completion transport.
pub struct Classifier {
    transport: Arc<dyn CompletionTransport>,
    pacer: Pacer,
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(transport: Arc<dyn CompletionTransport>, config: ClassifierConfig) -> Self {
        let pacer = Pacer::new(config.min_call_interval);
        Self {
            transport,
            pacer,
            config,
        }
    }

    /// Extracts company/position/status from a message already known to
    /// be job-related. Always returns a job-related classification: on
    /// any failure short of quota exhaustion the result degrades to a
    /// sender-derived guess rather than dropping a real application.
    pub async fn extract_trusted(
        &self,
        from: &str,
        subject: &str,
        body: &str,
    ) -> Result<Classification, ClassifyError> {
        let body = truncate_chars(body, self.config.trusted_body_limit);
        let rendered = prompt::EXTRACT.render(&[
            ("from", from),
            ("subject", subject),
            ("body", &body),
        ]);

        debug!(subject, "extracting (trusted)");

        match self.complete_with_retry(&rendered).await {
            Ok(text) => Ok(self.coerce_trusted(&text, from)),
            Err(CallFailure::QuotaExhausted) => Err(ClassifyError::QuotaExhausted),
            Err(CallFailure::Degraded(reason)) => {
                warn!(subject, %reason, "trusted extraction degraded to sender guess");
                Ok(Classification {
                    company: fallback_company(from),
                    position: UNSPECIFIED_POSITION.to_string(),
                    status: Status::Sent,
                    confidence: 0.1,
                    is_job_related: true,
                })
            }
        }
    }

    /// Decides relevance for an unrecognized sender, then extracts. On
    /// failure the result stays not-job-related: an unreadable unknown
    /// message must not silently become an application.
    pub async fn classify_unknown(
        &self,
        from: &str,
        subject: &str,
        body: &str,
    ) -> Result<Classification, ClassifyError> {
        let body = truncate_chars(body, self.config.unknown_body_limit);
        let rendered = prompt::CLASSIFY.render(&[
            ("from", from),
            ("subject", subject),
            ("body", &body),
        ]);

        debug!(subject, "classifying (unknown)");

        match self.complete_with_retry(&rendered).await {
            Ok(text) => Ok(self.coerce_unknown(&text, from)),
            Err(CallFailure::QuotaExhausted) => Err(ClassifyError::QuotaExhausted),
            Err(CallFailure::Degraded(reason)) => {
                warn!(subject, %reason, "unknown classification failed; treating as unrelated");
                Ok(Classification {
                    company: fallback_company(from),
                    position: UNSPECIFIED_POSITION.to_string(),
                    status: Status::Sent,
                    confidence: 0.1,
                    is_job_related: false,
                })
            }
        }
    }

    /// Issues the transport call with throttle retries. Quota exhaustion
    /// aborts immediately; everything else resolves to a degraded
    /// failure after the retry budget.
    async fn complete_with_retry(&self, rendered: &str) -> Result<String, CallFailure> {
        let mut attempt: u32 = 0;

        loop {
            self.pacer.acquire().await;

            match self.transport.complete(rendered).await {
                Ok(text) => return Ok(text),
                Err(TransportError::RateLimited { retry_after }) => {
                    // A long or absent suggested delay means the daily
                    // quota is gone, not that we are calling too fast.
                    let exhausted = retry_after
                        .map_or(true, |delay| delay >= self.config.quota_delay_threshold);
                    if exhausted {
                        warn!(?retry_after, "completion quota exhausted");
                        return Err(CallFailure::QuotaExhausted);
                    }

                    if attempt >= self.config.max_retries {
                        return Err(CallFailure::Degraded(
                            "rate limit retries exhausted".to_string(),
                        ));
                    }

                    let backoff = retry_after
                        .unwrap_or_else(|| self.config.base_backoff * 2u32.pow(attempt));
                    info!(
                        attempt = attempt + 1,
                        max = self.config.max_retries,
                        ?backoff,
                        "rate limited; backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(CallFailure::Degraded(e.to_string())),
            }
        }
    }

    /// Trusted tier: job-relatedness is already settled, so it is forced
    /// true no matter what the model returned.
    fn coerce_trusted(&self, text: &str, from: &str) -> Classification {
        let raw = match parse_analysis(text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%e, "unparseable extraction response; using sender guess");
                return Classification {
                    company: fallback_company(from),
                    position: UNSPECIFIED_POSITION.to_string(),
                    status: Status::Sent,
                    confidence: 0.1,
                    is_job_related: true,
                };
            }
        };

        let classification = coerce_fields(raw, from, true);
        info!(
            company = %classification.company,
            position = %classification.position,
            status = %classification.status,
            confidence = classification.confidence,
            "extraction complete"
        );
        classification
    }

    fn coerce_unknown(&self, text: &str, from: &str) -> Classification {
        let raw = match parse_analysis(text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%e, "unparseable classification response; treating as unrelated");
                return Classification::not_job_related();
            }
        };

        if raw.is_job_related != Some(true) {
            debug!("model judged message not job-related");
            return Classification::not_job_related();
        }

        let classification = coerce_fields(raw, from, true);
        info!(
            company = %classification.company,
            position = %classification.position,
            status = %classification.status,
            confidence = classification.confidence,
            "classification complete"
        );
        classification
    }
}

fn parse_analysis(text: &str) -> Result<RawAnalysis, serde_json::Error> {
    let json = extract_json(text);
    serde_json::from_str(&json)
}

/// Applies the coercion rules shared by both tiers: any status outside
/// the enum falls back to `Sent`, confidence defaults to 0.5 and is
/// clamped into [0, 1], empty company/position get placeholders.
fn coerce_fields(raw: RawAnalysis, from: &str, is_job_related: bool) -> Classification {
    let company = raw
        .company
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| fallback_company(from));
    let position = raw
        .position
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| UNSPECIFIED_POSITION.to_string());
    let status = raw
        .status
        .as_deref()
        .and_then(Status::parse)
        .unwrap_or(Status::Sent);
    let confidence = raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0);

    Classification {
        company,
        position,
        status,
        confidence,
        is_job_related,
    }
}

/// Guesses the employer from a `From` header when extraction fails:
/// prefer the display name (unless it names the platform itself), else
/// the capitalized first label of the domain.
fn fallback_company(from: &str) -> String {
    if let Some(bracket) = from.find('<') {
        let name = from[..bracket].trim().trim_matches('"').trim();
        if !name.is_empty()
            && !GENERIC_SENDER_NAMES
                .iter()
                .any(|generic| name.eq_ignore_ascii_case(generic))
        {
            return name.to_string();
        }
    }

    if let Some(at) = from.find('@') {
        let rest = &from[at + 1..];
        let label: String = rest
            .chars()
            .take_while(|c| *c != '.' && *c != '>')
            .collect();
        if !label.is_empty() {
            let mut chars = label.chars();
            if let Some(first) = chars.next() {
                return first.to_uppercase().collect::<String>() + chars.as_str();
            }
        }
    }

    UNKNOWN_COMPANY.to_string()
}

/// Extracts the first balanced JSON object from model output, tracking
/// string boundaries and escape sequences so braces inside values do not
/// confuse the depth count.
fn extract_json(response: &str) -> String {
    let start = match response.find('{') {
        Some(idx) => idx,
        None => return response.to_string(),
    };

    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut end = response.len();

    for (i, c) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => {
                escape_next = true;
            }
            '"' => {
                in_string = !in_string;
            }
            '{' if !in_string => {
                depth += 1;
            }
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    response[start..end].to_string()
}

/// Character-bounded prefix (the limits are counts of chars, not bytes,
/// so multi-byte text never splits).
fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
