//! Gmail REST mailbox.
//!
//! Searches with a composed query (known job platforms OR job-related
//! subjects, bounded to a recent window), excludes already-recorded
//! message ids through the store, and decodes each remaining message to
//! plain text.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::model::RawMessage;
use crate::store::{Store, StoredToken, TokenStore};

use super::{Mailbox, MailboxError, Result};

const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// The search combines platform senders AND job-related subjects so we
// get mail that is EITHER from a known job platform OR carries a
// job-related subject line, bounded to the sync window.
const JOB_PLATFORM_QUERIES: &[&str] = &[
    "from:hellowork",
    "from:indeed",
    "from:welcometothejungle",
    "from:linkedin.com",
    "from:monster",
    "from:apec",
    "from:pole-emploi",
    "from:francetravail",
    "from:glassdoor",
    "from:talent.io",
    "from:mytalentplug",
    "from:jobteaser",
    "from:cadremploi",
];

const JOB_SUBJECT_QUERIES: &[&str] = &[
    "subject:candidature",
    "subject:entretien",
    "subject:interview",
    "subject:recrutement",
    "subject:(votre candidature)",
    "subject:(your application)",
    "subject:(offre d'emploi)",
];

fn build_search_query(window_days: u32) -> String {
    format!(
        "newer_than:{}d AND ({{{}}} OR {{{}}})",
        window_days,
        JOB_PLATFORM_QUERIES.join(" OR "),
        JOB_SUBJECT_QUERIES.join(" OR "),
    )
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
struct MessageDetail {
    id: String,
    #[serde(default)]
    snippet: String,
    #[serde(rename = "internalDate")]
    internal_date: String,
    payload: MessagePayload,
}

#[derive(Deserialize)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    parts: Option<Vec<MessagePart>>,
    #[serde(default)]
    body: Option<PartBody>,
}

#[derive(Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Deserialize)]
struct MessagePart {
    #[serde(rename = "mimeType", default)]
    mime_type: String,
    #[serde(default)]
    body: Option<PartBody>,
}

#[derive(Deserialize)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
}

/// Strips HTML down to readable text: drops style/script blocks, removes
/// tags, resolves the common entities, collapses whitespace.
struct HtmlStripper {
    blocks: Regex,
    tags: Regex,
    whitespace: Regex,
}

impl HtmlStripper {
    fn new() -> Self {
        Self {
            blocks: Regex::new(r"(?is)<(style|script)[^>]*>.*?</(style|script)>")
                .expect("static pattern"),
            tags: Regex::new(r"<[^>]+>").expect("static pattern"),
            whitespace: Regex::new(r"\s+").expect("static pattern"),
        }
    }

    fn strip(&self, html: &str) -> String {
        let text = self.blocks.replace_all(html, " ");
        let text = self.tags.replace_all(&text, " ");
        let text = text
            .replace("&nbsp;", " ")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}

/// Gmail-backed [`Mailbox`]. Owns token refresh; already-seen message ids
/// are excluded through the store before any detail fetch.
pub struct GmailMailbox {
    client: Client,
    tokens: Arc<dyn TokenStore>,
    store: Arc<dyn Store>,
    client_id: String,
    client_secret: SecretString,
    api_base: String,
    token_url: String,
    stripper: HtmlStripper,
}

impl GmailMailbox {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        store: Arc<dyn Store>,
        client_id: String,
        client_secret: SecretString,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MailboxError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            tokens,
            store,
            client_id,
            client_secret,
            api_base: GMAIL_API.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            stripper: HtmlStripper::new(),
        })
    }

    /// Custom endpoints, for tests and proxies.
    pub fn with_endpoints(mut self, api_base: String, token_url: String) -> Self {
        self.api_base = api_base;
        self.token_url = token_url;
        self
    }

    /// Returns a valid access token for the user, refreshing it first
    /// when expired.
    async fn access_token(&self, user_id: &str) -> Result<String> {
        let token = self
            .tokens
            .load_token(user_id)?
            .ok_or_else(|| MailboxError::CredentialsMissing(user_id.to_string()))?;

        if !token.is_expired(Utc::now()) {
            return Ok(token.access_token);
        }

        debug!(user_id, "access token expired; refreshing");
        let refreshed = self.refresh_token(&token).await?;
        self.tokens.save_token(&refreshed)?;
        Ok(refreshed.access_token)
    }

    async fn refresh_token(&self, token: &StoredToken) -> Result<StoredToken> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("grant_type", "refresh_token"),
            ("refresh_token", token.refresh_token.expose_secret()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| MailboxError::TokenRefresh(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(MailboxError::TokenRefresh(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| MailboxError::TokenRefresh(format!("bad token response: {}", e)))?;

        Ok(StoredToken {
            user_id: token.user_id.clone(),
            access_token: refreshed.access_token,
            refresh_token: token.refresh_token.clone(),
            expires_at: Utc::now() + chrono::Duration::seconds(refreshed.expires_in),
        })
    }

    async fn search_message_ids(
        &self,
        access_token: &str,
        window_days: u32,
        max_count: usize,
    ) -> Result<Vec<String>> {
        let query = build_search_query(window_days);
        debug!(%query, max_count, "searching mailbox");

        let url = format!("{}/messages", self.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("q", query.as_str()), ("maxResults", &max_count.to_string())])
            .send()
            .await
            .map_err(|e| MailboxError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(MailboxError::Backend { status, message });
        }

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| MailboxError::Decode(e.to_string()))?;

        Ok(search.messages.into_iter().map(|m| m.id).collect())
    }

    async fn fetch_detail(&self, access_token: &str, id: &str) -> Result<RawMessage> {
        let url = format!("{}/messages/{}", self.api_base, id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("format", "full")])
            .send()
            .await
            .map_err(|e| MailboxError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(MailboxError::Backend { status, message });
        }

        let detail: MessageDetail = response
            .json()
            .await
            .map_err(|e| MailboxError::Decode(e.to_string()))?;

        Ok(self.message_from_detail(detail))
    }

    fn message_from_detail(&self, detail: MessageDetail) -> RawMessage {
        let from = header_value(&detail.payload.headers, "From");
        let subject = header_value(&detail.payload.headers, "Subject");
        let body = self.extract_text_body(&detail);
        let received_at = parse_internal_date(&detail.internal_date);

        RawMessage {
            id: detail.id,
            from,
            subject,
            body,
            snippet: detail.snippet,
            received_at,
        }
    }

    fn extract_text_body(&self, detail: &MessageDetail) -> String {
        extract_text_body(&self.stripper, detail)
    }
}

/// Prefers a text/plain part, falls back to stripped text/html, then the
/// single-part body, then the snippet.
fn extract_text_body(stripper: &HtmlStripper, detail: &MessageDetail) -> String {
    if let Some(parts) = &detail.payload.parts {
        if let Some(data) = part_data(parts, "text/plain") {
            if let Some(text) = decode_base64url(data) {
                return text;
            }
        }
        if let Some(data) = part_data(parts, "text/html") {
            if let Some(html) = decode_base64url(data) {
                return stripper.strip(&html);
            }
        }
    }

    if let Some(data) = detail.payload.body.as_ref().and_then(|b| b.data.as_deref()) {
        if let Some(text) = decode_base64url(data) {
            return text;
        }
    }

    detail.snippet.clone()
}

#[async_trait::async_trait]
impl Mailbox for GmailMailbox {
    async fn fetch_unseen(
        &self,
        user_id: &str,
        window_days: u32,
        max_count: usize,
    ) -> Result<Vec<RawMessage>> {
        let access_token = self.access_token(user_id).await?;

        let ids = self
            .search_message_ids(&access_token, window_days, max_count)
            .await?;
        info!(found = ids.len(), "mailbox search complete");

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let seen = self.store.find_existing_message_ids(&ids)?;
        let seen: std::collections::HashSet<&String> = seen.iter().collect();
        let new_ids: Vec<&String> = ids.iter().filter(|id| !seen.contains(id)).collect();
        info!(
            seen = seen.len(),
            new = new_ids.len(),
            "excluded already-recorded messages"
        );

        let mut messages = Vec::with_capacity(new_ids.len());
        for id in new_ids {
            match self.fetch_detail(&access_token, id).await {
                Ok(message) => messages.push(message),
                Err(e) => {
                    // One unreadable message should not sink the batch.
                    warn!(message_id = %id, %e, "failed to fetch message detail");
                }
            }
        }

        // Oldest first, so downstream processing is chronological.
        messages.sort_by_key(|m| m.received_at);
        Ok(messages)
    }
}

fn header_value(headers: &[Header], name: &str) -> String {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
        .unwrap_or_default()
}

fn part_data<'a>(parts: &'a [MessagePart], mime_type: &str) -> Option<&'a str> {
    parts
        .iter()
        .find(|p| p.mime_type == mime_type)
        .and_then(|p| p.body.as_ref())
        .and_then(|b| b.data.as_deref())
}

fn decode_base64url(data: &str) -> Option<String> {
    let bytes = URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Gmail's `internalDate` is epoch milliseconds as a string.
fn parse_internal_date(value: &str) -> DateTime<Utc> {
    value
        .parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}
