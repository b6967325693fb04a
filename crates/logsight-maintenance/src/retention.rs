use chrono::{DateTime, Utc};
use logsight_core::config::OPLOG_RETENTION_DAYS;
use logsight_store::{oplog, Database, Result};
use tracing::info;

/// Deletes operational-log rows older than a fixed horizon in a single
/// statement. Runs daily, so no batching.
#[derive(Clone)]
pub struct RetentionJob {
    db: Database,
}

impl RetentionJob {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn run(&self) -> Result<usize> {
        self.run_at(Utc::now()).await
    }

    /// Prune as if the current time were `now`. Rows stamped exactly at
    /// the boundary are kept.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = oplog::retention_cutoff(now, OPLOG_RETENTION_DAYS);
        let deleted = self
            .db
            .call(move |conn| oplog::delete_before(conn, cutoff))
            .await?;
        info!(deleted, cutoff = %cutoff, "operation log retention finished");
        Ok(deleted)
    }
}
