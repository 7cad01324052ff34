//! Test harness for isolated sync runs.
//!
//! Wires a fake mailbox, a scripted completion transport and an
//! in-memory SQLite store into a real `SyncService`, so tests exercise
//! the whole pipeline without network or disk.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use jobtrail::classifier::{Classifier, ClassifierConfig, CompletionTransport, TransportError};
use jobtrail::config::FilterConfig;
use jobtrail::mailbox::{Mailbox, MailboxError};
use jobtrail::model::RawMessage;
use jobtrail::store::{SqliteStore, Store};
use jobtrail::sync::{SyncError, SyncService, SyncSummary};
use jobtrail::PreFilter;

/// In-memory mailbox honoring the collaborator contract: excludes
/// already-recorded message ids, caps the batch, returns oldest first.
pub struct FakeMailbox {
    messages: Mutex<Vec<RawMessage>>,
    store: Arc<SqliteStore>,
}

impl FakeMailbox {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            store,
        }
    }

    pub fn deliver(&self, message: RawMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

#[async_trait]
impl Mailbox for FakeMailbox {
    async fn fetch_unseen(
        &self,
        _user_id: &str,
        _window_days: u32,
        max_count: usize,
    ) -> Result<Vec<RawMessage>, MailboxError> {
        let messages = self.messages.lock().unwrap().clone();
        let ids: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();
        let seen = self.store.find_existing_message_ids(&ids)?;

        let mut unseen: Vec<RawMessage> = messages
            .into_iter()
            .filter(|m| !seen.contains(&m.id))
            .collect();
        unseen.sort_by_key(|m| m.received_at);
        unseen.truncate(max_count);
        Ok(unseen)
    }
}

/// Transport that replays scripted responses and records every prompt.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<String, TransportError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_ok(&self, response: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(response.into()));
    }

    pub fn push_err(&self, error: TransportError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionTransport for ScriptedTransport {
    async fn complete(&self, prompt: &str) -> Result<String, TransportError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("script exhausted".to_string())))
    }
}

/// Full-pipeline harness around a real `SyncService`.
pub struct TestHarness {
    pub store: Arc<SqliteStore>,
    pub mailbox: Arc<FakeMailbox>,
    pub transport: Arc<ScriptedTransport>,
    pub service: SyncService,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_filter_config(FilterConfig::default())
    }

    pub fn with_filter_config(filter_config: FilterConfig) -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().expect("in-memory store"));
        let mailbox = Arc::new(FakeMailbox::new(store.clone()));
        let transport = Arc::new(ScriptedTransport::new());

        let classifier = Classifier::new(
            transport.clone(),
            ClassifierConfig {
                min_call_interval: Duration::ZERO,
                base_backoff: Duration::from_millis(1),
                ..ClassifierConfig::default()
            },
        );

        let service = SyncService::new(
            mailbox.clone(),
            classifier,
            store.clone(),
            PreFilter::new(filter_config),
        );

        Self {
            store,
            mailbox,
            transport,
            service,
        }
    }

    pub async fn sync(&self, user_id: &str) -> Result<SyncSummary, SyncError> {
        self.service.sync(user_id, None).await
    }
}
