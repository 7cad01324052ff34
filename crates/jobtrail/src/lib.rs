pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod logging;
pub mod mailbox;
pub mod model;
pub mod reconcile;
pub mod store;
pub mod sync;

pub use classifier::{Classification, Classifier, ClassifierConfig, ClassifyError};
pub use config::{load_filter_config, FilterConfig};
pub use error::{JobtrailError, Result};
pub use filter::{Decision, PreFilter, Verdict};
pub use mailbox::{Mailbox, MailboxError};
pub use model::{Application, EmailRecord, RawMessage, Status};
pub use reconcile::Reconciler;
pub use store::{InsertOutcome, Store};
pub use sync::{SyncError, SyncService, SyncSummary};
