use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use logsight_core::config::{DatabaseConfig, SUPPORTED_DB_TYPE};
use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StoreError};

/// Shared handle to the relational store.
///
/// Cloning is cheap; every clone talks to the same connection. Callers on an
/// async runtime should go through [`Database::call`] so the blocking SQLite
/// work lands on the blocking pool.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open the store described by `cfg`. Only the SQLite engine exists;
    /// any other `type` is rejected before anything touches the disk.
    pub fn open(cfg: &DatabaseConfig) -> Result<Self> {
        if cfg.kind != SUPPORTED_DB_TYPE {
            return Err(StoreError::UnsupportedEngine(cfg.kind.clone()));
        }
        let path = Path::new(&cfg.path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "opening database");
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the current thread.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Cheap readiness check.
    pub fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }
}

/// Create every table this subsystem reads or writes. Idempotent.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    create_config_table(conn)?;
    create_operator_table(conn)?;
    create_operation_log_table(conn)?;
    Ok(())
}

fn create_config_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sys_config (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            type    TEXT NOT NULL,
            name    TEXT NOT NULL,
            value   TEXT NOT NULL DEFAULT '',
            remark  TEXT NOT NULL DEFAULT '',
            UNIQUE(type, name)
        );",
    )
}

fn create_operator_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sys_opr (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            username        TEXT NOT NULL UNIQUE,
            password_hash   TEXT NOT NULL,
            level           TEXT NOT NULL DEFAULT 'normal',  -- 'super' | 'normal'
            status          TEXT NOT NULL DEFAULT 'enabled',
            remark          TEXT NOT NULL DEFAULT '',
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );",
    )
}

fn create_operation_log_table(conn: &Connection) -> rusqlite::Result<()> {
    // opt_time is unix seconds; the retention job range-deletes on it.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sys_opr_log (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            opr_name    TEXT NOT NULL,
            opr_ip      TEXT NOT NULL DEFAULT '',
            opt_action  TEXT NOT NULL,
            opt_desc    TEXT NOT NULL DEFAULT '',
            opt_time    INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_opr_log_time ON sys_opr_log (opt_time);",
    )
}
