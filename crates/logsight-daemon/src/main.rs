use anyhow::Context;
use clap::Parser;
use logsight_core::LogsightConfig;
use logsight_daemon::Application;
use tracing::{info, warn};

/// LogSight background scheduling and telemetry daemon.
#[derive(Debug, Parser)]
#[command(name = "logsight", version, about)]
struct Cli {
    /// Config file (defaults to $LOGSIGHT_CONFIG, then ~/.logsight/logsight.toml).
    #[arg(short, long)]
    config: Option<String>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // explicit path > LOGSIGHT_CONFIG env > ~/.logsight/logsight.toml
    let config_path = cli.config.or_else(|| std::env::var("LOGSIGHT_CONFIG").ok());
    let config = LogsightConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        eprintln!("config load failed ({e}), using defaults");
        LogsightConfig::default()
    });

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        return Ok(());
    }

    let mut app = Application::launch(config, true)
        .await
        .context("startup failed")?;
    info!(version = env!("CARGO_PKG_VERSION"), "logsight running");

    shutdown_signal().await;
    app.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
