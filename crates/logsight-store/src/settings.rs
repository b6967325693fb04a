//! Typed reads and writes over the `sys_config` key/value table.
//!
//! Nothing is cached: every call is a round trip to storage, so a value
//! changed by another holder of the handle is visible on the next read.

use rusqlite::{params, Connection, OptionalExtension};

use crate::{db::Database, error::Result};

/// Scope of process-wide settings.
pub const SYSTEM: &str = "system";
pub const SYSTEM_TITLE: &str = "SystemTitle";
pub const SYSTEM_THEME: &str = "SystemTheme";
pub const APP_VERSION: &str = "LogSightVersion";
pub const DEFAULT_THEME: &str = "light";

#[derive(Clone)]
pub struct Settings {
    db: Database,
}

impl Settings {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Value of `(stype, name)`, or an empty string when no row exists.
    pub fn get_string(&self, stype: &str, name: &str) -> Result<String> {
        self.db
            .with_conn(|conn| Ok(select_value(conn, stype, name)?.unwrap_or_default()))
    }

    /// Integer value of `(stype, name)`.
    ///
    /// Missing rows and values that do not read as a number yield 0.
    /// Fractional values are truncated.
    pub fn get_i64(&self, stype: &str, name: &str) -> Result<i64> {
        Ok(lenient_i64(&self.get_string(stype, name)?))
    }

    pub fn get_system_string(&self, name: &str) -> Result<String> {
        self.get_string(SYSTEM, name)
    }

    /// Overwrite an existing row. Returns the number of rows changed, which is
    /// 0 when `(stype, name)` does not exist.
    pub fn set(&self, stype: &str, name: &str, value: &str) -> Result<usize> {
        self.db.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE sys_config SET value = ?1 WHERE type = ?2 AND name = ?3",
                params![value, stype, name],
            )?)
        })
    }

    /// Insert `(stype, name, value)` unless the key already exists.
    /// Returns true when a row was inserted.
    pub fn insert_if_absent(
        &self,
        stype: &str,
        name: &str,
        value: &str,
        remark: &str,
    ) -> Result<bool> {
        self.db.with_conn(|conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO sys_config (type, name, value, remark)
                 VALUES (?1, ?2, ?3, ?4)",
                params![stype, name, value, remark],
            )?;
            Ok(n > 0)
        })
    }

    /// Current UI theme. An unset theme is repaired to `"light"` in storage.
    pub fn system_theme(&self) -> Result<String> {
        let theme = self.get_system_string(SYSTEM_THEME)?;
        if !theme.is_empty() {
            return Ok(theme);
        }
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sys_config (type, name, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(type, name) DO UPDATE SET value = excluded.value",
                params![SYSTEM, SYSTEM_THEME, DEFAULT_THEME],
            )?;
            Ok(())
        })?;
        Ok(DEFAULT_THEME.to_string())
    }

    pub fn set_system_theme(&self, theme: &str) -> Result<()> {
        self.set(SYSTEM, SYSTEM_THEME, theme)?;
        Ok(())
    }
}

fn select_value(conn: &Connection, stype: &str, name: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM sys_config WHERE type = ?1 AND name = ?2 LIMIT 1",
        params![stype, name],
        |row| row.get(0),
    )
    .optional()
}

fn lenient_i64(raw: &str) -> i64 {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return n;
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => f as i64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn missing_key_reads_as_empty_and_zero() {
        let s = settings();
        assert_eq!(s.get_string(SYSTEM, "Nope").unwrap(), "");
        assert_eq!(s.get_i64(SYSTEM, "Nope").unwrap(), 0);
    }

    #[test]
    fn set_only_touches_existing_rows() {
        let s = settings();
        assert_eq!(s.set(SYSTEM, "PageSize", "20").unwrap(), 0);
        assert_eq!(s.get_system_string("PageSize").unwrap(), "");

        assert!(s.insert_if_absent(SYSTEM, "PageSize", "10", "").unwrap());
        assert!(!s.insert_if_absent(SYSTEM, "PageSize", "99", "").unwrap());
        assert_eq!(s.get_i64(SYSTEM, "PageSize").unwrap(), 10);

        assert_eq!(s.set(SYSTEM, "PageSize", "20").unwrap(), 1);
        assert_eq!(s.get_i64(SYSTEM, "PageSize").unwrap(), 20);
    }

    #[test]
    fn scopes_are_independent() {
        let s = settings();
        s.insert_if_absent("mail", "Port", "25", "").unwrap();
        s.insert_if_absent(SYSTEM, "Port", "8080", "").unwrap();
        assert_eq!(s.get_i64("mail", "Port").unwrap(), 25);
        assert_eq!(s.get_i64(SYSTEM, "Port").unwrap(), 8080);
    }

    #[test]
    fn lenient_integer_parsing() {
        assert_eq!(lenient_i64(" 42 "), 42);
        assert_eq!(lenient_i64("-7"), -7);
        assert_eq!(lenient_i64("3.9"), 3);
        assert_eq!(lenient_i64("abc"), 0);
        assert_eq!(lenient_i64(""), 0);
        assert_eq!(lenient_i64("NaN"), 0);
    }

    #[test]
    fn empty_theme_is_repaired_to_light() {
        let s = settings();
        assert_eq!(s.system_theme().unwrap(), DEFAULT_THEME);
        assert_eq!(s.get_system_string(SYSTEM_THEME).unwrap(), DEFAULT_THEME);

        s.set_system_theme("dark").unwrap();
        assert_eq!(s.system_theme().unwrap(), "dark");
    }

    #[test]
    fn reads_are_not_cached() {
        let db = Database::open_in_memory().unwrap();
        let a = Settings::new(db.clone());
        let b = Settings::new(db);
        a.insert_if_absent(SYSTEM, SYSTEM_TITLE, "LogSight", "").unwrap();
        assert_eq!(b.get_system_string(SYSTEM_TITLE).unwrap(), "LogSight");
        a.set(SYSTEM, SYSTEM_TITLE, "Ops").unwrap();
        assert_eq!(b.get_system_string(SYSTEM_TITLE).unwrap(), "Ops");
    }
}
