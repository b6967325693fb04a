use std::{
    fmt,
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};

use logsight_core::config::LogsightConfig;
use tempfile::TempPath;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::BackupError;

/// Script used when `backup.template` is not configured.
pub const DEFAULT_TEMPLATE: &str = include_str!("../assets/backup.sh");

/// Every token a template may reference.
pub const PLACEHOLDERS: [&str; 7] = [
    "{dbhost}",
    "{dbport}",
    "{dbuser}",
    "{dbpwd}",
    "{dbname}",
    "{dbpath}",
    "{backupdir}",
];

/// Values substituted into the script template.
#[derive(Clone, Default)]
pub struct BackupParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub db_path: String,
    pub backup_dir: String,
}

impl BackupParams {
    pub fn from_config(cfg: &LogsightConfig) -> Self {
        Self {
            host: cfg.database.host.clone(),
            port: cfg.database.port,
            user: cfg.database.user.clone(),
            password: cfg.database.passwd.clone(),
            name: cfg.database.name.clone(),
            db_path: cfg.database.path.clone(),
            backup_dir: cfg.backup.dir.clone(),
        }
    }

    /// Reject values that would escape the quoting in a template.
    pub fn validate(&self) -> Result<(), BackupError> {
        let fields = [
            ("database.host", &self.host),
            ("database.user", &self.user),
            ("database.passwd", &self.password),
            ("database.name", &self.name),
            ("database.path", &self.db_path),
            ("backup.dir", &self.backup_dir),
        ];
        match fields.into_iter().find(|(_, value)| !is_shell_safe(value)) {
            Some((field, _)) => Err(BackupError::UnsafeValue { field }),
            None => Ok(()),
        }
    }

    fn substitutions(&self) -> [(&'static str, String); 7] {
        [
            ("{dbhost}", self.host.clone()),
            ("{dbport}", self.port.to_string()),
            ("{dbuser}", self.user.clone()),
            ("{dbpwd}", self.password.clone()),
            ("{dbname}", self.name.clone()),
            ("{dbpath}", self.db_path.clone()),
            ("{backupdir}", self.backup_dir.clone()),
        ]
    }
}

// Keep the password out of logs.
impl fmt::Debug for BackupParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("name", &self.name)
            .field("db_path", &self.db_path)
            .field("backup_dir", &self.backup_dir)
            .finish()
    }
}

/// Characters that end or expand inside a quoted shell word.
const SHELL_UNSAFE: [char; 5] = ['"', '\'', '$', '`', '\\'];

fn is_shell_safe(value: &str) -> bool {
    !value
        .chars()
        .any(|c| c.is_control() || SHELL_UNSAFE.contains(&c))
}

/// Replace every placeholder in `template` with its value from `params`.
/// Values are inserted verbatim; [`BackupJob::run`] validates them first.
pub fn render_script(template: &str, params: &BackupParams) -> String {
    params
        .substitutions()
        .iter()
        .fold(template.to_string(), |script, (token, value)| {
            script.replace(token, value)
        })
}

/// Placeholders still present in a rendered script.
pub fn unresolved_placeholders(script: &str) -> Vec<&'static str> {
    PLACEHOLDERS
        .into_iter()
        .filter(|token| script.contains(*token))
        .collect()
}

#[derive(Debug, Clone)]
pub struct BackupOutcome {
    /// stdout followed by stderr.
    pub output: String,
    pub elapsed: Duration,
}

/// Renders the backup script, runs it through the shell and removes it.
#[derive(Debug, Clone)]
pub struct BackupJob {
    params: BackupParams,
    template: String,
    shell: PathBuf,
    script_dir: Option<PathBuf>,
}

impl BackupJob {
    pub fn new(params: BackupParams) -> Self {
        Self {
            params,
            template: DEFAULT_TEMPLATE.to_string(),
            shell: PathBuf::from("sh"),
            script_dir: None,
        }
    }

    /// Build from the loaded configuration, reading `backup.template` when set.
    pub fn from_config(cfg: &LogsightConfig) -> Result<Self, BackupError> {
        let job = Self::new(BackupParams::from_config(cfg));
        match cfg.backup.template.as_deref() {
            Some(path) if !path.trim().is_empty() => {
                let template =
                    std::fs::read_to_string(path).map_err(|source| BackupError::Template {
                        path: path.to_string(),
                        source,
                    })?;
                Ok(job.with_template(template))
            }
            _ => Ok(job),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Directory for the temporary script. Defaults to the system temp dir.
    pub fn with_script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_dir = Some(dir.into());
        self
    }

    pub fn rendered(&self) -> String {
        render_script(&self.template, &self.params)
    }

    /// Run one backup.
    ///
    /// The script only exists on disk for the duration of this call; it is
    /// removed whether the shell succeeds, fails or cannot be spawned.
    /// Unsafe parameter values are refused before anything is written.
    pub async fn run(&self) -> Result<BackupOutcome, BackupError> {
        self.params.validate()?;
        let script = self.rendered();
        let leftover = unresolved_placeholders(&script);
        if !leftover.is_empty() {
            warn!(?leftover, "backup script has unresolved placeholders");
        }

        let path = self.write_script(&script)?;
        debug!(script = %path.display(), "backup script written");
        let result = self.execute(&path).await;
        if let Err(e) = path.close() {
            warn!("failed to remove backup script: {e}");
        }
        result
    }

    fn write_script(&self, script: &str) -> Result<TempPath, BackupError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("logsight-backup-").suffix(".sh");
        let mut file = match &self.script_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(script.as_bytes())?;
        file.flush()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o700))?;
        }
        Ok(file.into_temp_path())
    }

    async fn execute(&self, script: &Path) -> Result<BackupOutcome, BackupError> {
        let started = Instant::now();
        let out = Command::new(&self.shell)
            .arg(script)
            .stdin(Stdio::null())
            .output()
            .await?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        info!(
            status = out.status.code().unwrap_or(-1),
            output = %output.trim_end(),
            "backup script finished"
        );

        if !out.status.success() {
            return Err(BackupError::Failed {
                status: out.status.code().unwrap_or(-1),
                output,
            });
        }
        Ok(BackupOutcome {
            output,
            elapsed: started.elapsed(),
        })
    }
}
