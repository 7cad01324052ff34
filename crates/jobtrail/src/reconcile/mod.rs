//! Reconciliation engine: folds one classification into the application
//! ledger.
//!
//! Applications are found-or-created per (user, company, position), and
//! status only ever moves forward along the stage order; a late or
//! low-confidence email can never drag an interview back to "sent".
//! Every processed message leaves exactly one email record, keyed by the
//! mailbox message id, so re-deliveries are absorbed silently.

use std::sync::Arc;

use tracing::{debug, info};

use crate::classifier::Classification;
use crate::model::{NewEmailRecord, RawMessage};
use crate::store::{InsertOutcome, Store, StoreError};

pub struct Reconciler {
    store: Arc<dyn Store>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Applies a classification result for one message. Returns the id of
    /// the application the email was attached to, or `None` when the
    /// message was not job-related.
    pub fn reconcile(
        &self,
        user_id: &str,
        message: &RawMessage,
        result: &Classification,
    ) -> Result<Option<String>, StoreError> {
        if !result.is_job_related {
            self.record(NewEmailRecord::suppressed(message))?;
            return Ok(None);
        }

        let application = match self
            .store
            .find_application(user_id, &result.company, &result.position)?
        {
            None => {
                let created = self.store.create_application(
                    user_id,
                    &result.company,
                    &result.position,
                    result.status,
                )?;
                info!(
                    company = %created.company,
                    position = %created.position,
                    status = %created.status,
                    "new application"
                );
                created
            }
            Some(existing) => {
                // Forward-only merge along the stage order.
                if result.status > existing.status {
                    self.store
                        .update_application_status(&existing.id, result.status)?;
                    info!(
                        company = %existing.company,
                        from = %existing.status,
                        to = %result.status,
                        "application advanced"
                    );
                    crate::model::Application {
                        status: result.status,
                        ..existing
                    }
                } else {
                    debug!(
                        company = %existing.company,
                        current = %existing.status,
                        reported = %result.status,
                        "application already at or past reported stage"
                    );
                    existing
                }
            }
        };

        self.record(NewEmailRecord {
            application_id: Some(application.id.clone()),
            message_id: message.id.clone(),
            subject: message.subject.clone(),
            from: message.from.clone(),
            snippet: message.snippet.clone(),
            detected_status: Some(result.status),
            is_job_related: true,
            received_at: message.received_at,
        })?;

        Ok(Some(application.id))
    }

    fn record(&self, record: NewEmailRecord) -> Result<(), StoreError> {
        let message_id = record.message_id.clone();
        match self.store.create_email_record(record)? {
            InsertOutcome::Inserted => {}
            InsertOutcome::Duplicate => {
                debug!(%message_id, "message already recorded; skipping");
            }
        }
        Ok(())
    }
}
