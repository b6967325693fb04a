//! Idempotent startup post-checks.
//!
//! Each check is independent: one failing is logged and the rest still run.
//! Nothing here is fatal to the process.

use tracing::{error, info, warn};

use crate::{
    db::Database,
    error::Result,
    settings::{Settings, APP_VERSION, DEFAULT_THEME, SYSTEM, SYSTEM_THEME, SYSTEM_TITLE},
    users,
};

/// Rows every installation is expected to have: (type, name, value, remark).
pub const DEFAULT_SETTINGS: &[(&str, &str, &str, &str)] = &[
    (SYSTEM, SYSTEM_TITLE, "LogSight", "title shown in the UI header"),
    (SYSTEM, SYSTEM_THEME, DEFAULT_THEME, "UI theme"),
    (SYSTEM, APP_VERSION, "", "version that last ran against this database"),
];

/// What a post-check run changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PostCheckReport {
    pub admin_created: bool,
    pub settings_inserted: usize,
    pub version_updated: bool,
    pub failures: usize,
}

/// Insert any missing [`DEFAULT_SETTINGS`] row. Returns how many were added.
pub fn ensure_default_settings(settings: &Settings) -> Result<usize> {
    let mut inserted = 0;
    for (stype, name, value, remark) in DEFAULT_SETTINGS {
        if settings.insert_if_absent(stype, name, value, remark)? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Record `build_version` as the version running against this database.
/// Returns true when the stored value changed.
pub fn check_app_version(settings: &Settings, build_version: &str) -> Result<bool> {
    let stored = settings.get_system_string(APP_VERSION)?;
    if stored == build_version {
        return Ok(false);
    }
    if settings.set(SYSTEM, APP_VERSION, build_version)? == 0 {
        settings.insert_if_absent(SYSTEM, APP_VERSION, build_version, "")?;
    }
    info!(from = %stored, to = build_version, "application version recorded");
    Ok(true)
}

/// Run every post-check against `db`, logging failures.
pub fn run_post_checks(db: &Database, build_version: &str) -> PostCheckReport {
    let mut report = PostCheckReport::default();
    let settings = Settings::new(db.clone());

    match db.with_conn(users::ensure_super_admin) {
        Ok(Some(password)) => {
            report.admin_created = true;
            warn!(
                username = users::SUPER_ADMIN,
                password = %password,
                "created super administrator; change this password after first login"
            );
        }
        Ok(None) => {}
        Err(e) => {
            report.failures += 1;
            error!("super administrator check failed: {e}");
        }
    }

    match ensure_default_settings(&settings) {
        Ok(n) => report.settings_inserted = n,
        Err(e) => {
            report.failures += 1;
            error!("default settings check failed: {e}");
        }
    }

    match check_app_version(&settings, build_version) {
        Ok(changed) => report.version_updated = changed,
        Err(e) => {
            report.failures += 1;
            error!("application version check failed: {e}");
        }
    }

    report
}
