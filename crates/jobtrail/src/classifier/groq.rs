//! Groq chat-completions transport.

use std::time::Duration;

use regex::Regex;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::transport::{CompletionTransport, TransportError};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length for error bodies kept in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_error_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i < MAX_ERROR_BODY_LENGTH)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}... (truncated)", &body[..cut])
    } else {
        body.to_string()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Completion transport backed by the Groq OpenAI-compatible endpoint.
pub struct GroqClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    /// Matches "try again in 7m33.194s" style hints in rate-limit bodies.
    retry_hint: Regex,
}

impl GroqClient {
    pub fn new(api_key: SecretString) -> Result<Self, TransportError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Custom endpoint, for self-hosted gateways and tests.
    pub fn with_base_url(api_key: SecretString, base_url: String) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {}", e)))?;

        let retry_hint = Regex::new(r"try again in (?:(\d+)h)?(?:(\d+)m)?([0-9.]+)s")
            .map_err(|e| TransportError::Request(format!("invalid retry-hint pattern: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url,
            model: DEFAULT_MODEL.to_string(),
            retry_hint,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Extracts a retry delay from a 429 response: the `retry-after`
    /// header when present, else the delay quoted in the error body.
    fn retry_delay(&self, retry_after_header: Option<&str>, body: &str) -> Option<Duration> {
        if let Some(value) = retry_after_header {
            if let Ok(secs) = value.trim().parse::<u64>() {
                return Some(Duration::from_secs(secs));
            }
        }

        let captures = self.retry_hint.captures(body)?;
        let hours: u64 = captures.get(1).map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let minutes: u64 = captures.get(2).map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let seconds: f64 = captures.get(3)?.as_str().parse().ok()?;
        Some(Duration::from_secs_f64(
            (hours * 3600 + minutes * 60) as f64 + seconds,
        ))
    }
}

#[async_trait::async_trait]
impl CompletionTransport for GroqClient {
    async fn complete(&self, prompt: &str) -> Result<String, TransportError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.1,
            max_tokens: 256,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_header = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            let retry_after = self.retry_delay(retry_after_header.as_deref(), &body);
            debug!(?retry_after, "completion backend rate limited");
            return Err(TransportError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Backend {
                status: status.as_u16(),
                message: truncate_error_body(&body),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                TransportError::MalformedResponse("response contained no completion".to_string())
            })
    }
}
