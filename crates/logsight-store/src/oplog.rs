//! The operational (audit) log table.
//!
//! Rows are appended by request-handling code and only ever removed in bulk
//! by the retention job.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationLog {
    pub id: i64,
    pub opr_name: String,
    pub opr_ip: String,
    pub opt_action: String,
    pub opt_desc: String,
    /// Unix seconds.
    pub opt_time: i64,
}

/// Append one entry stamped `at`. Returns the new row id.
pub fn append(
    conn: &Connection,
    opr_name: &str,
    opr_ip: &str,
    action: &str,
    desc: &str,
    at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO sys_opr_log (opr_name, opr_ip, opt_action, opt_desc, opt_time)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![opr_name, opr_ip, action, desc, at.timestamp()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete every row with `opt_time` strictly before `cutoff`, in one pass.
pub fn delete_before(conn: &Connection, cutoff: DateTime<Utc>) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM sys_opr_log WHERE opt_time < ?1",
        params![cutoff.timestamp()],
    )?)
}

/// Retention boundary for a horizon of `days` ending at `now`.
pub fn retention_cutoff(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}

/// Most recent entries first.
pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<OperationLog>> {
    let mut stmt = conn.prepare(
        "SELECT id, opr_name, opr_ip, opt_action, opt_desc, opt_time
         FROM sys_opr_log ORDER BY opt_time DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok(OperationLog {
                id: row.get(0)?,
                opr_name: row.get(1)?,
                opr_ip: row.get(2)?,
                opt_action: row.get(3)?,
                opt_desc: row.get(4)?,
                opt_time: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM sys_opr_log", [], |r| r.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::TimeZone;

    fn conn() -> Connection {
        let c = Connection::open_in_memory().unwrap();
        init_db(&c).unwrap();
        c
    }

    #[test]
    fn append_and_list_newest_first() {
        let c = conn();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        append(&c, "admin", "10.0.0.1", "login", "", t0).unwrap();
        let id = append(&c, "admin", "10.0.0.1", "logout", "", t0 + Duration::hours(1)).unwrap();

        let rows = recent(&c, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].opt_action, "logout");
        assert_eq!(recent(&c, 1).unwrap().len(), 1);
    }

    #[test]
    fn delete_before_is_strict() {
        let c = conn();
        let cutoff = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        append(&c, "a", "", "old", "", cutoff - Duration::seconds(1)).unwrap();
        append(&c, "a", "", "edge", "", cutoff).unwrap();
        append(&c, "a", "", "new", "", cutoff + Duration::seconds(1)).unwrap();

        assert_eq!(delete_before(&c, cutoff).unwrap(), 1);
        let left: Vec<String> = recent(&c, 10)
            .unwrap()
            .into_iter()
            .map(|r| r.opt_action)
            .collect();
        assert_eq!(left, vec!["new", "edge"]);
    }

    #[test]
    fn cutoff_is_days_before_now() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            retention_cutoff(now, 365),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }
}
