use thiserror::Error;

/// A metric could not be read from the platform.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("metrics are not supported on this platform")]
    Unsupported,

    #[error("metric read failed: {0}")]
    Read(String),
}

/// A write to the telemetry sink failed.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}
