use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cadence expression could not be parsed. Registration is rejected
    /// and the trigger table is left untouched.
    #[error("Invalid cadence '{spec}': {reason}")]
    Parse { spec: String, reason: String },
}

impl SchedulerError {
    pub(crate) fn parse(spec: &str, reason: impl Into<String>) -> Self {
        SchedulerError::Parse {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
