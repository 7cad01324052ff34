//! Sync orchestrator: one batch pull of the inbox, end to end.
//!
//! Fetch → pre-filter → persist noise → classify sequentially →
//! reconcile → summary. AI calls are strictly one at a time because the
//! completion backend enforces a hard rate limit; the ordering (trusted
//! before unknown) means an early abort still lands the messages that
//! were guaranteed to be real applications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::classifier::{Classifier, ClassifyError};
use crate::filter::{Decision, PreFilter};
use crate::mailbox::{Mailbox, MailboxError};
use crate::model::NewEmailRecord;
use crate::reconcile::Reconciler;
use crate::store::Store;

/// Search window when the caller does not override it.
pub const DEFAULT_WINDOW_DAYS: u32 = 3;

/// Maximum messages pulled per sync run.
pub const BATCH_CAP: usize = 50;

/// Counters for one sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Messages that produced or advanced an application.
    pub processed: u64,
    /// Messages set aside: noise plus not-job-related classifications.
    pub skipped: u64,
    /// Completed classification calls.
    pub ai_calls: u64,
    /// Messages fetched this run.
    pub total: u64,
    pub elapsed_ms: u64,
}

impl SyncSummary {
    fn empty(elapsed_ms: u64) -> Self {
        Self {
            processed: 0,
            skipped: 0,
            ai_calls: 0,
            total: 0,
            elapsed_ms,
        }
    }
}

/// Errors reported to the sync caller.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Another sync is in flight; the request is rejected, not queued.
    #[error("a sync is already running")]
    AlreadyRunning,

    #[error("sync window must be at least one day")]
    InvalidWindow,

    #[error("a user id is required")]
    MissingUser,

    /// The mailbox could not be read; the run aborts before any AI cost.
    #[error("mailbox error: {0}")]
    Mailbox(#[from] MailboxError),
}

impl SyncError {
    /// HTTP-style status class for a thin request layer to relay.
    pub fn status_code(&self) -> u16 {
        match self {
            SyncError::AlreadyRunning => 409,
            SyncError::InvalidWindow | SyncError::MissingUser => 400,
            SyncError::Mailbox(_) => 502,
        }
    }
}

/// Releases the single-flight flag on every exit path.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives sync runs. One instance enforces single-flight for the process
/// it lives in; multi-instance deployments need a shared lock store
/// instead of this in-memory flag.
pub struct SyncService {
    mailbox: Arc<dyn Mailbox>,
    classifier: Classifier,
    reconciler: Reconciler,
    store: Arc<dyn Store>,
    filter: PreFilter,
    running: AtomicBool,
}

impl SyncService {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        classifier: Classifier,
        store: Arc<dyn Store>,
        filter: PreFilter,
    ) -> Self {
        Self {
            mailbox,
            classifier,
            reconciler: Reconciler::new(store.clone()),
            store,
            filter,
            running: AtomicBool::new(false),
        }
    }

    /// Runs one sync for a user. `window_days` overrides the default
    /// search window and must be at least 1.
    pub async fn sync(
        &self,
        user_id: &str,
        window_days: Option<u32>,
    ) -> Result<SyncSummary, SyncError> {
        // Input errors are rejected before any I/O or state change.
        if user_id.trim().is_empty() {
            return Err(SyncError::MissingUser);
        }
        let window = window_days.unwrap_or(DEFAULT_WINDOW_DAYS);
        if window == 0 {
            return Err(SyncError::InvalidWindow);
        }

        let _guard = self.acquire()?;
        let start = Instant::now();

        info!(user_id, window, "sync started");

        let messages = self.mailbox.fetch_unseen(user_id, window, BATCH_CAP).await?;
        let total = messages.len() as u64;

        if messages.is_empty() {
            info!(user_id, "no new messages");
            return Ok(SyncSummary::empty(elapsed_ms(start)));
        }

        // Partition through the pre-filter, preserving order within each
        // tier.
        let mut trusted = Vec::new();
        let mut unknown = Vec::new();
        let mut noise = Vec::new();
        for message in messages {
            let verdict = self.filter.classify(&message.from, &message.subject);
            debug!(
                subject = %message.subject,
                decision = ?verdict.decision,
                reason = %verdict.reason,
                "pre-filtered"
            );
            match verdict.decision {
                Decision::Trusted => trusted.push(message),
                Decision::Noise => noise.push(message),
                Decision::Unknown => unknown.push(message),
            }
        }
        info!(
            trusted = trusted.len(),
            unknown = unknown.len(),
            noise = noise.len(),
            "pre-filter complete"
        );

        // Noise is recorded before any AI call so it never costs quota
        // and is excluded from the next fetch.
        let mut skipped = noise.len() as u64;
        for message in &noise {
            if let Err(e) = self
                .store
                .create_email_record(NewEmailRecord::suppressed(message))
            {
                warn!(message_id = %message.id, %e, "failed to record noise message");
            }
        }

        // Trusted first: guaranteed applications land even if the run
        // aborts partway through.
        let trusted_count = trusted.len();
        let worklist: Vec<_> = trusted.into_iter().chain(unknown).collect();

        let mut processed = 0u64;
        let mut ai_calls = 0u64;

        for (index, message) in worklist.iter().enumerate() {
            let is_trusted = index < trusted_count;

            let result = if is_trusted {
                self.classifier
                    .extract_trusted(&message.from, &message.subject, &message.body)
                    .await
            } else {
                self.classifier
                    .classify_unknown(&message.from, &message.subject, &message.body)
                    .await
            };

            let classification = match result {
                Ok(classification) => {
                    ai_calls += 1;
                    classification
                }
                Err(ClassifyError::QuotaExhausted) => {
                    // The one failure class that stops the batch: every
                    // further call today is certain to fail. The run
                    // still returns a summary of its partial progress.
                    warn!(
                        remaining = worklist.len() - index,
                        "completion quota exhausted; stopping batch early"
                    );
                    break;
                }
            };

            match self.reconciler.reconcile(user_id, message, &classification) {
                Ok(Some(_)) => processed += 1,
                Ok(None) => skipped += 1,
                Err(e) => {
                    // Per-message persistence failures do not abort the
                    // batch; the message will be retried on a later run.
                    error!(message_id = %message.id, %e, "failed to reconcile message");
                }
            }
        }

        let summary = SyncSummary {
            processed,
            skipped,
            ai_calls,
            total,
            elapsed_ms: elapsed_ms(start),
        };
        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            ai_calls = summary.ai_calls,
            total = summary.total,
            elapsed_ms = summary.elapsed_ms,
            "sync complete"
        );
        Ok(summary)
    }

    fn acquire(&self) -> Result<RunGuard<'_>, SyncError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::AlreadyRunning)?;
        Ok(RunGuard {
            flag: &self.running,
        })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierConfig, CompletionTransport, TransportError};
    use crate::config::FilterConfig;
    use crate::model::RawMessage;
    use crate::store::SqliteStore;
    use std::time::Duration;

    struct EmptyMailbox;

    #[async_trait::async_trait]
    impl Mailbox for EmptyMailbox {
        async fn fetch_unseen(
            &self,
            _user_id: &str,
            _window_days: u32,
            _max_count: usize,
        ) -> crate::mailbox::Result<Vec<RawMessage>> {
            Ok(Vec::new())
        }
    }

    struct SlowMailbox {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl Mailbox for SlowMailbox {
        async fn fetch_unseen(
            &self,
            _user_id: &str,
            _window_days: u32,
            _max_count: usize,
        ) -> crate::mailbox::Result<Vec<RawMessage>> {
            tokio::time::sleep(self.delay).await;
            Ok(Vec::new())
        }
    }

    struct FailingMailbox;

    #[async_trait::async_trait]
    impl Mailbox for FailingMailbox {
        async fn fetch_unseen(
            &self,
            user_id: &str,
            _window_days: u32,
            _max_count: usize,
        ) -> crate::mailbox::Result<Vec<RawMessage>> {
            Err(MailboxError::CredentialsMissing(user_id.to_string()))
        }
    }

    struct NoTransport;

    #[async_trait::async_trait]
    impl CompletionTransport for NoTransport {
        async fn complete(&self, _prompt: &str) -> Result<String, TransportError> {
            Err(TransportError::Request("not wired in this test".to_string()))
        }
    }

    fn service(mailbox: Arc<dyn Mailbox>) -> SyncService {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let classifier = Classifier::new(
            Arc::new(NoTransport),
            ClassifierConfig {
                min_call_interval: Duration::ZERO,
                base_backoff: Duration::from_millis(1),
                ..ClassifierConfig::default()
            },
        );
        SyncService::new(
            mailbox,
            classifier,
            store,
            PreFilter::new(FilterConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_missing_user_is_rejected() {
        let s = service(Arc::new(EmptyMailbox));
        let err = s.sync("  ", None).await.unwrap_err();
        assert!(matches!(err, SyncError::MissingUser));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_zero_window_is_rejected() {
        let s = service(Arc::new(EmptyMailbox));
        let err = s.sync("u1", Some(0)).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidWindow));
    }

    #[tokio::test]
    async fn test_empty_mailbox_returns_zero_summary() {
        let s = service(Arc::new(EmptyMailbox));
        let summary = s.sync("u1", None).await.unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.ai_calls, 0);
        assert_eq!(summary.total, 0);
    }

    #[tokio::test]
    async fn test_concurrent_sync_is_rejected() {
        let s = Arc::new(service(Arc::new(SlowMailbox {
            delay: Duration::from_millis(200),
        })));

        let background = {
            let s = s.clone();
            tokio::spawn(async move { s.sync("u1", None).await })
        };
        // Give the first sync time to take the guard.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = s.sync("u1", None).await.unwrap_err();
        assert!(matches!(err, SyncError::AlreadyRunning));
        assert_eq!(err.status_code(), 409);

        // The in-progress run is unaffected by the rejected request.
        let first = background.await.unwrap().unwrap();
        assert_eq!(first.total, 0);
    }

    #[tokio::test]
    async fn test_guard_released_after_mailbox_failure() {
        let s = service(Arc::new(FailingMailbox));

        let err = s.sync("u1", None).await.unwrap_err();
        assert!(matches!(err, SyncError::Mailbox(_)));
        assert_eq!(err.status_code(), 502);

        // The flag must be free again: the next attempt reaches the
        // mailbox rather than failing with a conflict.
        let err = s.sync("u1", None).await.unwrap_err();
        assert!(matches!(err, SyncError::Mailbox(_)));
    }

    #[tokio::test]
    async fn test_invalid_input_does_not_take_the_guard() {
        let s = Arc::new(service(Arc::new(EmptyMailbox)));
        let _ = s.sync("", None).await.unwrap_err();
        // A valid request right after must not see a conflict.
        assert!(s.sync("u1", None).await.is_ok());
    }
}
