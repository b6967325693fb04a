use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to read backup template {path}: {source}")]
    Template {
        path: String,
        source: std::io::Error,
    },

    /// A substituted value could break out of its quoting in the script.
    #[error("backup parameter {field} contains a shell metacharacter or control character")]
    UnsafeValue { field: &'static str },

    #[error("backup I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The script ran and exited unsuccessfully. `status` is -1 when the
    /// shell was killed by a signal.
    #[error("backup script exited with status {status}")]
    Failed { status: i32, output: String },
}
