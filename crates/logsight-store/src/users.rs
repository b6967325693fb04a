use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{Result, StoreError};

pub const SUPER_ADMIN: &str = "admin";
pub const LEVEL_SUPER: &str = "super";

/// Make sure at least one super operator exists.
///
/// When none does, `admin` is created (or promoted, if it already exists as a
/// normal operator). A freshly created account gets a random password which
/// is returned so the caller can surface it once; `None` means nothing had
/// to be generated.
pub fn ensure_super_admin(conn: &Connection) -> Result<Option<String>> {
    let supers: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sys_opr WHERE level = ?1",
        params![LEVEL_SUPER],
        |r| r.get(0),
    )?;
    if supers > 0 {
        return Ok(None);
    }

    let now = Utc::now().to_rfc3339();
    let promoted = conn.execute(
        "UPDATE sys_opr SET level = ?1, updated_at = ?2 WHERE username = ?3",
        params![LEVEL_SUPER, now, SUPER_ADMIN],
    )?;
    if promoted > 0 {
        return Ok(None);
    }

    let password = Uuid::new_v4().simple().to_string();
    conn.execute(
        "INSERT INTO sys_opr (username, password_hash, level, status, remark, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'enabled', 'built-in administrator', ?4, ?4)",
        params![SUPER_ADMIN, hash_password(&password)?, LEVEL_SUPER, now],
    )?;
    Ok(Some(password))
}

/// Check `password` against the stored hash for `username`.
/// Unknown users and malformed hashes verify as false.
pub fn verify_password(conn: &Connection, username: &str, password: &str) -> Result<bool> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT password_hash FROM sys_opr WHERE username = ?1",
            params![username],
            |r| r.get(0),
        )
        .optional()?;
    let Some(stored) = stored else {
        return Ok(false);
    };
    let Ok(parsed) = PasswordHash::new(&stored) else {
        return Ok(false);
    };
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Argon2id PHC string for `password` with a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| StoreError::PasswordHash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| StoreError::PasswordHash(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn conn() -> Connection {
        let c = Connection::open_in_memory().unwrap();
        init_db(&c).unwrap();
        c
    }

    #[test]
    fn creates_admin_once() {
        let c = conn();
        let pw = ensure_super_admin(&c).unwrap().expect("generated password");
        assert_eq!(pw.len(), 32);
        assert!(verify_password(&c, SUPER_ADMIN, &pw).unwrap());
        assert!(!verify_password(&c, SUPER_ADMIN, "wrong").unwrap());

        assert!(ensure_super_admin(&c).unwrap().is_none());
        let n: i64 = c
            .query_row("SELECT COUNT(*) FROM sys_opr", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn existing_admin_is_promoted_not_replaced() {
        let c = conn();
        let hash = hash_password("keep-me").unwrap();
        c.execute(
            "INSERT INTO sys_opr (username, password_hash, level, created_at, updated_at)
             VALUES ('admin', ?1, 'normal', '', '')",
            params![hash],
        )
        .unwrap();

        assert!(ensure_super_admin(&c).unwrap().is_none());
        assert!(verify_password(&c, SUPER_ADMIN, "keep-me").unwrap());
        let level: String = c
            .query_row("SELECT level FROM sys_opr WHERE username = 'admin'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(level, LEVEL_SUPER);
    }

    #[test]
    fn unknown_user_does_not_verify() {
        assert!(!verify_password(&conn(), "ghost", "x").unwrap());
    }
}
