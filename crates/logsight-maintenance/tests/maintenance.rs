// Backup script lifecycle and retention boundaries.

use chrono::{Duration, TimeZone, Utc};
use logsight_core::config::DatabaseConfig;
use logsight_maintenance::{
    backup::{render_script, unresolved_placeholders, DEFAULT_TEMPLATE},
    BackupError, BackupJob, BackupParams, RetentionJob,
};
use logsight_store::{oplog, Database};

fn spec_params(db_path: &str, backup_dir: &str) -> BackupParams {
    BackupParams {
        host: "db".to_string(),
        port: 5432,
        user: "u".to_string(),
        password: "p".to_string(),
        name: "mydb".to_string(),
        db_path: db_path.to_string(),
        backup_dir: backup_dir.to_string(),
    }
}

fn dir_is_empty(dir: &std::path::Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[test]
fn network_style_template_has_no_leftover_tokens() {
    let template = "PGPASSWORD={dbpwd} pg_dump -h {dbhost} -p {dbport} -U {dbuser} {dbname} > {backupdir}/{dbname}.sql";
    let script = render_script(template, &spec_params("/x.db", "/backups"));
    assert_eq!(
        script,
        "PGPASSWORD=p pg_dump -h db -p 5432 -U u mydb > /backups/mydb.sql"
    );
    assert!(unresolved_placeholders(&script).is_empty());
    assert!(unresolved_placeholders(DEFAULT_TEMPLATE).len() > 1);
}

#[cfg(unix)]
#[tokio::test]
async fn script_is_removed_after_success() {
    let scripts = tempfile::tempdir().unwrap();
    let job = BackupJob::new(spec_params("/x.db", "/backups"))
        .with_template("echo dumping {dbname} from {dbhost}:{dbport}\necho warn >&2\n")
        .with_script_dir(scripts.path());

    let outcome = job.run().await.unwrap();

    assert!(outcome.output.contains("dumping mydb from db:5432"));
    assert!(outcome.output.contains("warn"));
    assert!(dir_is_empty(scripts.path()));
}

#[cfg(unix)]
#[tokio::test]
async fn script_is_removed_after_failure() {
    let scripts = tempfile::tempdir().unwrap();
    let job = BackupJob::new(spec_params("/x.db", "/backups"))
        .with_template("echo cannot reach {dbhost} >&2\nexit 3\n")
        .with_script_dir(scripts.path());

    let err = job.run().await.unwrap_err();

    match err {
        BackupError::Failed { status, output } => {
            assert_eq!(status, 3);
            assert!(output.contains("cannot reach db"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(dir_is_empty(scripts.path()));
}

#[cfg(unix)]
#[tokio::test]
async fn script_is_removed_when_shell_is_missing() {
    let scripts = tempfile::tempdir().unwrap();
    let job = BackupJob::new(spec_params("/x.db", "/backups"))
        .with_shell("/nonexistent/shell")
        .with_script_dir(scripts.path());

    assert!(matches!(job.run().await, Err(BackupError::Io(_))));
    assert!(dir_is_empty(scripts.path()));
}

#[cfg(unix)]
#[tokio::test]
async fn injected_password_never_reaches_the_shell() {
    let scripts = tempfile::tempdir().unwrap();
    let marker = scripts.path().join("pwned");
    let mut params = spec_params("/x.db", "/backups");
    params.password = format!("$(touch {})", marker.display());
    let job = BackupJob::new(params)
        .with_template("echo {dbpwd}\n")
        .with_script_dir(scripts.path());

    let err = job.run().await.unwrap_err();

    assert!(matches!(
        err,
        BackupError::UnsafeValue {
            field: "database.passwd"
        }
    ));
    assert!(!marker.exists());
    assert!(dir_is_empty(scripts.path()));
}

#[cfg(unix)]
#[tokio::test]
async fn default_template_backs_up_sqlite_file() {
    let work = tempfile::tempdir().unwrap();
    let db_path = work.path().join("logsight.db");
    let cfg = DatabaseConfig {
        path: db_path.display().to_string(),
        ..DatabaseConfig::default()
    };
    drop(Database::open(&cfg).unwrap());
    let backup_dir = work.path().join("backup");

    let job = BackupJob::new(spec_params(
        db_path.to_str().unwrap(),
        backup_dir.to_str().unwrap(),
    ));
    let outcome = job.run().await.unwrap();

    assert!(outcome.output.contains("backup written to"));
    let written: Vec<_> = std::fs::read_dir(&backup_dir).unwrap().collect();
    assert_eq!(written.len(), 1);
}

#[tokio::test]
async fn retention_deletes_strictly_older_rows() {
    let db = Database::open_in_memory().unwrap();
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let edge = now - Duration::days(365);

    for (action, at) in [
        ("ancient", edge - Duration::days(30)),
        ("just-older", edge - Duration::seconds(1)),
        ("edge", edge),
        ("recent", now - Duration::days(1)),
    ] {
        db.with_conn(|c| oplog::append(c, "admin", "", action, "", at))
            .unwrap();
    }

    let deleted = RetentionJob::new(db.clone()).run_at(now).await.unwrap();

    assert_eq!(deleted, 2);
    let kept: Vec<String> = db
        .with_conn(|c| oplog::recent(c, 10))
        .unwrap()
        .into_iter()
        .map(|r| r.opt_action)
        .collect();
    assert_eq!(kept, vec!["recent", "edge"]);
}

#[tokio::test]
async fn retention_on_empty_table_is_a_no_op() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(RetentionJob::new(db).run().await.unwrap(), 0);
}
