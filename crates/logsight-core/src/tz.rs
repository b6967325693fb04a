//! Process-wide timezone.
//!
//! Set once during startup from `system.location`; read by the scheduler
//! (cron evaluation) and the log formatter. Until set, UTC is in effect.

use std::sync::OnceLock;

use chrono_tz::Tz;

use crate::error::{LogsightError, Result};

static LOCAL_ZONE: OnceLock<Tz> = OnceLock::new();

/// Resolve an IANA zone name. An empty name selects UTC.
pub fn resolve(name: &str) -> Result<Tz> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(Tz::UTC);
    }
    name.parse::<Tz>()
        .map_err(|_| LogsightError::Timezone(name.to_string()))
}

/// Install `zone` as the process timezone. Returns false if one was already set.
pub fn set_local_zone(zone: Tz) -> bool {
    LOCAL_ZONE.set(zone).is_ok()
}

/// The process timezone (UTC when never set).
pub fn local_zone() -> Tz {
    LOCAL_ZONE.get().copied().unwrap_or(Tz::UTC)
}
