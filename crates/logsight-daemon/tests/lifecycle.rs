// End-to-end startup and shutdown against scratch storage.

use logsight_core::LogsightConfig;
use logsight_daemon::{Application, LifecycleState};
use logsight_store::settings::{APP_VERSION, SYSTEM_THEME};

fn scratch_config(dir: &tempfile::TempDir) -> LogsightConfig {
    let mut cfg = LogsightConfig::default();
    cfg.system.startup_grace_secs = 0;
    cfg.system.readiness_retries = 1;
    cfg.database.path = dir.path().join("logsight.db").display().to_string();
    cfg.logger.metrics_storage = dir.path().join("metrics.db").display().to_string();
    cfg.backup.dir = dir.path().join("backup").display().to_string();
    cfg
}

#[tokio::test]
async fn launch_runs_post_checks_and_starts_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = Application::launch(scratch_config(&dir), false)
        .await
        .unwrap();

    assert_eq!(app.state(), LifecycleState::Running);
    // monitor, backup, retention
    assert_eq!(app.trigger_count(), 3);

    let settings = app.settings().unwrap();
    assert_eq!(settings.get_system_string(SYSTEM_THEME).unwrap(), "light");
    assert_eq!(
        settings.get_system_string(APP_VERSION).unwrap(),
        env!("CARGO_PKG_VERSION")
    );

    app.shutdown().await;
    assert_eq!(app.state(), LifecycleState::Stopped);
    app.shutdown().await;
    assert_eq!(app.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn unsupported_engine_aborts_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = scratch_config(&dir);
    cfg.database.kind = "postgres".to_string();

    let mut app = Application::new();
    app.configure(cfg, false).unwrap();
    let err = app.open_storage().unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(app.state(), LifecycleState::Configuring);
    assert!(!dir.path().join("logsight.db").exists());
}

#[tokio::test]
async fn invalid_timezone_is_fail_soft() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = scratch_config(&dir);
    cfg.system.location = "Nowhere/Atlantis".to_string();

    let mut app = Application::new();
    app.configure(cfg, false).unwrap();

    assert_eq!(app.zone(), chrono_tz::Tz::UTC);
    assert_eq!(app.state(), LifecycleState::Configuring);
}

#[tokio::test]
async fn missing_backup_template_only_drops_backup() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = scratch_config(&dir);
    cfg.backup.template = Some(dir.path().join("absent.sh").display().to_string());

    let mut app = Application::launch(cfg, false).await.unwrap();
    assert_eq!(app.trigger_count(), 2);
    app.shutdown().await;
}
