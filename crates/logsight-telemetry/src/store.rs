//! SQLite-backed telemetry sink.

use std::{path::Path, sync::Mutex};

use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::{error::SinkError, sink::TelemetrySink, types::MetricPoint};

const SECS_PER_DAY: i64 = 86_400;

/// Durable time-series store with a rolling retention window.
///
/// Each insert also prunes points of the written metrics that fell out of
/// the window, so the table never grows past `retention_days` of history.
pub struct SqliteTelemetryStore {
    db: Mutex<Connection>,
    retention_secs: i64,
}

impl SqliteTelemetryStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>, retention_days: u32) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), retention_days, "opening telemetry store");
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::new(conn, retention_days)
    }

    pub fn new(conn: Connection, retention_days: u32) -> Result<Self, SinkError> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            retention_secs: i64::from(retention_days.max(1)) * SECS_PER_DAY,
        })
    }

    /// Points of `metric` with `from <= timestamp <= to`, oldest first.
    pub fn query(&self, metric: &str, from: i64, to: i64) -> Result<Vec<MetricPoint>, SinkError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(
            "SELECT metric, value, timestamp FROM metrics
             WHERE metric = ?1 AND timestamp >= ?2 AND timestamp <= ?3
             ORDER BY timestamp",
        )?;
        let rows = stmt
            .query_map(params![metric, from, to], |row| {
                Ok(MetricPoint {
                    metric: row.get(0)?,
                    value: row.get(1)?,
                    timestamp: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl TelemetrySink for SqliteTelemetryStore {
    fn insert(&self, rows: &[MetricPoint]) -> Result<(), SinkError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO metrics (metric, value, timestamp) VALUES (?1, ?2, ?3)",
            )?;
            let mut prune =
                tx.prepare_cached("DELETE FROM metrics WHERE metric = ?1 AND timestamp < ?2")?;
            for row in rows {
                insert.execute(params![row.metric, row.value, row.timestamp])?;
                let pruned = prune.execute(params![row.metric, row.timestamp - self.retention_secs])?;
                if pruned > 0 {
                    debug!(metric = %row.metric, pruned, "expired telemetry points removed");
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS metrics (
            metric      TEXT    NOT NULL,
            value       REAL    NOT NULL,
            timestamp   INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_metrics_metric_ts
            ON metrics (metric, timestamp);",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(retention_days: u32) -> SqliteTelemetryStore {
        SqliteTelemetryStore::new(Connection::open_in_memory().unwrap(), retention_days).unwrap()
    }

    #[test]
    fn insert_then_query_range() {
        let s = store(7);
        s.insert(&[
            MetricPoint::new("system_cpuuse", 10.0, 100),
            MetricPoint::new("system_cpuuse", 20.0, 130),
            MetricPoint::new("system_memuse", 1e9, 130),
        ])
        .unwrap();

        let cpu = s.query("system_cpuuse", 0, 1_000).unwrap();
        assert_eq!(cpu.len(), 2);
        assert_eq!(cpu[0].value, 10.0);
        assert_eq!(cpu[1].timestamp, 130);

        assert_eq!(s.query("system_cpuuse", 120, 1_000).unwrap().len(), 1);
        assert!(s.query("app_cpuuse", 0, 1_000).unwrap().is_empty());
    }

    #[test]
    fn points_outside_retention_are_pruned_on_insert() {
        let s = store(1);
        s.insert(&[MetricPoint::new("app_memuse", 1.0, 0)]).unwrap();
        s.insert(&[MetricPoint::new("app_memuse", 2.0, SECS_PER_DAY)]).unwrap();
        // Exactly one window old: still retained.
        assert_eq!(s.query("app_memuse", 0, i64::MAX).unwrap().len(), 2);

        s.insert(&[MetricPoint::new("app_memuse", 3.0, SECS_PER_DAY + 1)]).unwrap();
        let left = s.query("app_memuse", 0, i64::MAX).unwrap();
        assert_eq!(left.len(), 2);
        assert_eq!(left[0].value, 2.0);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("metrics.db");
        let s = SqliteTelemetryStore::open(&path, 7).unwrap();
        s.insert(&[MetricPoint::new("system_cpuuse", 1.0, 1)]).unwrap();
        assert!(path.exists());
    }
}
