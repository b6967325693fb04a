//! `logsight-core`: configuration, shared constants and the process-wide
//! timezone used by every other LogSight crate.

pub mod config;
pub mod error;
pub mod tz;

pub use config::LogsightConfig;
pub use error::{LogsightError, Result};
