use std::{fmt, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::{Result, SchedulerError};

/// A parsed cadence expression.
#[derive(Clone)]
pub enum Cadence {
    /// Fire every `period`, measured from the previous firing.
    Every { period: Duration },

    /// Cron schedule evaluated in the scheduler's timezone. `expr` is the
    /// normalised six-field form handed to the `cron` crate.
    Cron {
        expr: String,
        schedule: Box<cron::Schedule>,
    },
}

impl fmt::Debug for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Every { period } => write!(f, "Every({period:?})"),
            Cadence::Cron { expr, .. } => write!(f, "Cron({expr})"),
        }
    }
}

impl Cadence {
    /// Parse any supported cadence form (see the crate docs for the table).
    pub fn parse(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(SchedulerError::parse(spec, "empty expression"));
        }

        if let Some(rest) = trimmed.strip_prefix("@every") {
            let period = parse_duration(rest.trim()).map_err(|r| SchedulerError::parse(spec, r))?;
            return Ok(Cadence::Every { period });
        }

        if trimmed.starts_with('@') {
            let expr = descriptor(trimmed)
                .ok_or_else(|| SchedulerError::parse(spec, "unknown descriptor"))?;
            return Self::cron(spec, expr.to_string());
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("every ") {
            let period = parse_shorthand(&lower).map_err(|r| SchedulerError::parse(spec, r))?;
            return Ok(Cadence::Every { period });
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let expr = match fields.len() {
            5 => format!("0 {}", fields.join(" ")),
            6 => fields.join(" "),
            n => {
                return Err(SchedulerError::parse(
                    spec,
                    format!("expected 5 or 6 cron fields, got {n}"),
                ))
            }
        };
        Self::cron(spec, expr)
    }

    fn cron(spec: &str, expr: String) -> Result<Self> {
        let schedule =
            cron::Schedule::from_str(&expr).map_err(|e| SchedulerError::parse(spec, e.to_string()))?;
        // A syntactically valid expression can still never match (e.g. Feb 30).
        if schedule.upcoming(Utc).next().is_none() {
            return Err(SchedulerError::parse(spec, "expression never fires"));
        }
        Ok(Cadence::Cron {
            expr,
            schedule: Box::new(schedule),
        })
    }

    /// The first firing strictly after `from`.
    pub fn next_after(&self, from: DateTime<Utc>, zone: &Tz) -> Option<DateTime<Utc>> {
        match self {
            Cadence::Every { period } => {
                let step = chrono::Duration::from_std(*period).ok()?;
                from.checked_add_signed(step)
            }
            Cadence::Cron { schedule, .. } => schedule
                .after(&from.with_timezone(zone))
                .next()
                .map(|at| at.with_timezone(&Utc)),
        }
    }
}

/// Six-field equivalents of the named descriptors.
fn descriptor(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => Some("0 0 0 1 1 *"),
        "@monthly" => Some("0 0 0 1 * *"),
        "@weekly" => Some("0 0 0 * * Sun"),
        "@daily" | "@midnight" => Some("0 0 0 * * *"),
        "@hourly" => Some("0 0 * * * *"),
        _ => None,
    }
}

/// Parse `1h30m`, `45s`, `250ms` style durations. Zero is rejected.
fn parse_duration(text: &str) -> std::result::Result<Duration, String> {
    if text.is_empty() {
        return Err("missing duration".to_string());
    }
    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(format!("expected a number at '{rest}'"));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("number out of range at '{rest}'"))?;
        rest = &rest[digits..];
        let unit_len = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];
        let step = match unit {
            "h" => value.checked_mul(3600).map(Duration::from_secs),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "s" => Some(Duration::from_secs(value)),
            "ms" => Some(Duration::from_millis(value)),
            "" => return Err("missing unit".to_string()),
            other => return Err(format!("unknown unit '{other}'")),
        };
        total = step
            .and_then(|step| total.checked_add(step))
            .ok_or_else(out_of_range)?;
    }
    checked_period(total)
}

fn out_of_range() -> String {
    "interval out of range".to_string()
}

/// Reject zero and periods too long to add to a wall-clock time.
fn checked_period(period: Duration) -> std::result::Result<Duration, String> {
    if period.is_zero() {
        return Err("interval must be positive".to_string());
    }
    chrono::Duration::from_std(period).map_err(|_| out_of_range())?;
    Ok(period)
}

/// Parse `every N <unit>` where unit is seconds, minutes or hours.
fn parse_shorthand(text: &str) -> std::result::Result<Duration, String> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    let [_, count, unit] = parts.as_slice() else {
        return Err("expected 'every <n> <unit>'".to_string());
    };
    let count: u64 = count
        .parse()
        .map_err(|_| format!("invalid count '{count}'"))?;
    let secs = match *unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Some(count),
        "m" | "min" | "mins" | "minute" | "minutes" => count.checked_mul(60),
        "h" | "hour" | "hours" => count.checked_mul(3600),
        other => return Err(format!("unknown unit '{other}'")),
    };
    checked_period(Duration::from_secs(secs.ok_or_else(out_of_range)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, s).unwrap()
    }

    #[test]
    fn every_shorthand_and_compound_durations() {
        let c = Cadence::parse("@every 30s").unwrap();
        assert!(matches!(c, Cadence::Every { period } if period == Duration::from_secs(30)));

        let c = Cadence::parse("@every 1m30s").unwrap();
        assert!(matches!(c, Cadence::Every { period } if period == Duration::from_secs(90)));

        let c = Cadence::parse("every 10 seconds").unwrap();
        assert!(matches!(c, Cadence::Every { period } if period == Duration::from_secs(10)));

        let c = Cadence::parse("Every 2 Minutes").unwrap();
        assert!(matches!(c, Cadence::Every { period } if period == Duration::from_secs(120)));
    }

    #[test]
    fn interval_next_is_one_period_later() {
        let c = Cadence::parse("@every 30s").unwrap();
        assert_eq!(c.next_after(at(1, 0, 0), &Tz::UTC), Some(at(1, 0, 30)));
    }

    #[test]
    fn daily_fires_at_next_midnight() {
        let c = Cadence::parse("@daily").unwrap();
        let next = c.next_after(at(13, 45, 0), &Tz::UTC).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap());
    }

    #[test]
    fn daily_respects_timezone() {
        // Midnight in Shanghai (UTC+8) is 16:00 UTC the previous day.
        let c = Cadence::parse("@daily").unwrap();
        let next = c.next_after(at(13, 45, 0), &Tz::Asia__Shanghai).unwrap();
        assert_eq!(next, at(16, 0, 0));
    }

    #[test]
    fn five_field_cron_defaults_seconds_to_zero() {
        let c = Cadence::parse("*/5 * * * *").unwrap();
        match &c {
            Cadence::Cron { expr, .. } => assert_eq!(expr, "0 */5 * * * *"),
            other => panic!("unexpected cadence {other:?}"),
        }
        assert_eq!(c.next_after(at(10, 2, 17), &Tz::UTC), Some(at(10, 5, 0)));
    }

    #[test]
    fn six_field_cron_with_seconds() {
        let c = Cadence::parse("15 * * * * *").unwrap();
        assert_eq!(c.next_after(at(10, 2, 17), &Tz::UTC), Some(at(10, 3, 15)));
    }

    #[test]
    fn hourly_descriptor() {
        let c = Cadence::parse("@hourly").unwrap();
        assert_eq!(c.next_after(at(10, 2, 17), &Tz::UTC), Some(at(11, 0, 0)));
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        for spec in [
            "",
            "@every",
            "@every 0s",
            "@every 5x",
            "@every s",
            "@fortnightly",
            "every five seconds",
            "every 0 seconds",
            "* * *",
            "61 * * * * *",
            "* * * * * * * *",
            "not a cron",
            "@every 18446744073709551615h",
            "every 18446744073709551615 hours",
            "@every 18446744073709551615s18446744073709551615s",
        ] {
            let err = Cadence::parse(spec).expect_err(spec);
            assert!(matches!(err, SchedulerError::Parse { .. }), "{spec}");
        }
    }

    #[test]
    fn oversized_intervals_report_out_of_range() {
        for spec in [
            "@every 18446744073709551615h",
            "@every 18446744073709551615m",
            "every 18446744073709551615 minutes",
            "@every 18446744073709551615s18446744073709551615s",
            "@every 18446744073709551615s",
        ] {
            match Cadence::parse(spec).expect_err(spec) {
                SchedulerError::Parse { reason, .. } => {
                    assert_eq!(reason, "interval out of range", "{spec}")
                }
            }
        }
    }
}
