//! Analyst application entry point.
//!
//! Loads configuration, installs logging and dispatches to the proxy server,
//! the terminal chat, the metrics report or the order import.

mod cli;
mod devices;
mod repl;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use analyst_api::{start_server, AppState};
use analyst_backend::{HttpBackend, RouteTable};
use analyst_chat::{ChatController, Player, Recorder};
use analyst_core::config::AnalystConfig;
use analyst_storage::{Database, MetricsAggregator, NewOrder, OrderRepository};

use crate::cli::{CliArgs, Command};
use crate::devices::{FileMicrophone, FileSink};

/// Expand a leading `~` to the user's home directory.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if let Some(rest) = data_dir
        .strip_prefix("~/")
        .or_else(|| data_dir.strip_prefix("~\\"))
    {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(data_dir)
    }
}

fn open_database(data_dir: &Path) -> Result<Arc<Database>, Box<dyn std::error::Error>> {
    let db_path = data_dir.join("analyst.db");
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");
    Ok(Arc::new(db))
}

async fn serve(config: AnalystConfig, data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_database(data_dir)?;
    tracing::info!(backend = %config.backend.base_url, "Proxying to analytics backend");
    let state = AppState::from_config(config, db)?;
    start_server(state).await?;
    Ok(())
}

async fn chat(
    config: &AnalystConfig,
    data_dir: &Path,
    recording: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let timeout =
        (config.backend.timeout_secs > 0).then(|| Duration::from_secs(config.backend.timeout_secs));
    let proxy = HttpBackend::new(config.chat.proxy_url.clone(), RouteTable::PROXY, timeout)?;
    tracing::info!(proxy = %proxy.base_url(), "Chat client connecting");

    let mut controller = ChatController::new(
        Arc::new(proxy),
        Recorder::new(Box::new(FileMicrophone::new(recording))),
        Player::new(Box::new(FileSink::new(data_dir.join("replies")))),
        &config.chat,
    );
    repl::run(&mut controller).await?;
    Ok(())
}

async fn metrics(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let aggregator = MetricsAggregator::new(open_database(data_dir)?);
    let snapshot = aggregator.snapshot().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn import(data_dir: &Path, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let orders: Vec<NewOrder> = serde_json::from_str(&content)?;
    let repo = OrderRepository::new(open_database(data_dir)?);
    let inserted = repo.insert_many(&orders)?;
    tracing::info!(path = %path.display(), inserted, "Orders imported");
    println!("imported {} orders", inserted);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let config_exists = config_file.exists();
    let mut config = AnalystConfig::load_or_default(&config_file);
    args.apply_overrides(&mut config);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Analyst v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        path = %config_file.display(),
        found = config_exists,
        "Configuration resolved"
    );

    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    match args.command() {
        Command::Serve { .. } => serve(config, &data_dir).await,
        Command::Chat { recording, .. } => chat(&config, &data_dir, recording).await,
        Command::Metrics => metrics(&data_dir).await,
        Command::Import { path } => import(&data_dir, &path),
    }
}
