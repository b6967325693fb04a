//! Daily maintenance work: database backup and operational-log retention.
//!
//! Both jobs report failures through their return value and never panic;
//! the caller decides how loudly to log.

pub mod backup;
pub mod error;
pub mod retention;

pub use backup::{BackupJob, BackupOutcome, BackupParams};
pub use error::BackupError;
pub use retention::RetentionJob;
