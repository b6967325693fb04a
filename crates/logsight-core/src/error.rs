use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogsightError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Misconfiguration that must abort startup (e.g. an unsupported
    /// database engine).
    #[error("Fatal configuration error: {0}")]
    FatalConfig(String),

    #[error("Unknown timezone: {0}")]
    Timezone(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LogsightError {
    /// Whether this error must terminate the process instead of being logged.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LogsightError::FatalConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, LogsightError>;
