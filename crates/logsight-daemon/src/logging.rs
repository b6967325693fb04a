//! Log subscriber assembly.
//!
//! Console, file and Loki sinks are enabled independently from `[logger]`.
//! `RUST_LOG` overrides the level implied by `logger.mode`.

use std::{fmt, path::Path, time::Duration};

use anyhow::{anyhow, Context as _};
use chrono::Utc;
use chrono_tz::Tz;
use logsight_core::config::LoggerConfig;
use tracing_appender::{
    non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt::{format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::loki::{self, LokiConfig, LokiShipper};

const RETAINED_LOG_FILES: usize = 30;
const RELEASE_WAIT: Duration = Duration::from_secs(5);

/// Timestamps rendered in the process timezone.
#[derive(Debug, Clone, Copy)]
pub struct ZonedTimer(pub Tz);

impl FormatTime for ZonedTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(
            w,
            "{}",
            Utc::now()
                .with_timezone(&self.0)
                .format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Keeps the asynchronous sinks alive. Call [`LoggingGuard::release`] on
/// shutdown so buffered lines are not lost.
pub struct LoggingGuard {
    file: Option<WorkerGuard>,
    loki: Option<LokiShipper>,
}

impl LoggingGuard {
    pub async fn release(self) {
        if let Some(loki) = self.loki {
            let dropped = loki.dropped();
            if dropped > 0 {
                tracing::warn!(dropped, "log lines dropped by the remote sink queue");
            }
            loki.release(RELEASE_WAIT).await;
        }
        // Dropping the worker guard flushes the file writer.
        drop(self.file);
    }
}

pub fn default_directive(cfg: &LoggerConfig) -> &'static str {
    if cfg.is_development() {
        "debug"
    } else {
        "info"
    }
}

/// Install the global subscriber. Fails if one is already installed.
///
/// The Loki shipper is spawned on the current runtime, so this must run
/// inside one when `loki_enable` is set.
pub fn init(cfg: &LoggerConfig, zone: Tz) -> anyhow::Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(cfg)));
    let timer = ZonedTimer(zone);

    let console = cfg.console_enable.then(|| {
        tracing_subscriber::fmt::layer()
            .with_timer(timer)
            .with_target(true)
    });

    let (file, file_guard) = if cfg.file_enable {
        let (writer, guard) = file_writer(cfg)?;
        let layer = tracing_subscriber::fmt::layer()
            .with_timer(timer)
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let loki_wanted = cfg.loki_enable && !cfg.loki_api.trim().is_empty();
    let (loki, shipper) = if loki_wanted {
        let (layer, shipper) = loki::spawn(LokiConfig {
            api: cfg.loki_api.clone(),
            user: cfg.loki_user.clone(),
            password: cfg.loki_pwd.clone(),
            job: cfg.loki_job.clone(),
            queue_size: cfg.queue_size,
        });
        (Some(layer), Some(shipper))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .with(loki)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    if cfg.loki_enable && !loki_wanted {
        tracing::warn!("logger.loki_enable is set but logger.loki_api is empty; remote sink disabled");
    }

    Ok(LoggingGuard {
        file: file_guard,
        loki: shipper,
    })
}

/// Daily-rotated, non-blocking file writer. At most `queue_size` lines are
/// buffered; beyond that lines are dropped rather than stalling the caller.
fn file_writer(cfg: &LoggerConfig) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    let path = Path::new(&cfg.filename);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let stem = path
        .file_stem()
        .ok_or_else(|| anyhow!("logger.filename has no file name: {}", cfg.filename))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let mut builder = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(stem.to_string_lossy())
        .max_log_files(RETAINED_LOG_FILES);
    if let Some(ext) = path.extension() {
        builder = builder.filename_suffix(ext.to_string_lossy());
    }
    let appender = builder.build(dir)?;

    Ok(NonBlockingBuilder::default()
        .buffered_lines_limit(cfg.queue_size.max(1))
        .lossy(true)
        .finish(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_selects_level() {
        let mut cfg = LoggerConfig::default();
        assert_eq!(default_directive(&cfg), "info");
        cfg.mode = "Development".to_string();
        assert_eq!(default_directive(&cfg), "debug");
    }

    #[test]
    fn file_writer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LoggerConfig {
            filename: dir.path().join("logs").join("ls.log").display().to_string(),
            queue_size: 8,
            ..LoggerConfig::default()
        };
        let (_writer, _guard) = file_writer(&cfg).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn zoned_timer_uses_offset() {
        let mut out = String::new();
        ZonedTimer(Tz::Asia__Shanghai)
            .format_time(&mut Writer::new(&mut out))
            .unwrap();
        assert!(out.ends_with("+08:00"), "{out}");
    }
}
