mod cli;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

use cli::{Cli, Commands};
use todo_sync::ExportBundle;
use todo_sync::api::{self, AppState};
use todo_sync::config::Config;
use todo_sync::storage::recommend;
use todo_sync::utils::paths::get_logs_dir;

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Initialize file-based logging for one-shot commands.
///
/// Logs are written to `<data dir>/todo-sync/logs/todo-sync.log` (or the
/// configured `log_dir`) so stdout only carries command output.
///
/// Log level can be controlled with RUST_LOG env var (default: info).
fn init_file_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let logs_dir = match &config.log_dir {
        Some(dir) => dir.clone(),
        None => get_logs_dir().ok()?,
    };

    if let Err(e) = fs::create_dir_all(&logs_dir) {
        eprintln!("Warning: Could not create logs directory: {}", e);
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&logs_dir, "todo-sync.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    Some(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => run_server_foreground(config, port),
        Commands::Export { output } => {
            let _guard = init_file_logging(&config);
            handle_export(config, output)
        }
        Commands::Import { file, migrate } => {
            let _guard = init_file_logging(&config);
            handle_import(config, &file, migrate)
        }
        Commands::Status => {
            let _guard = init_file_logging(&config);
            handle_status(config)
        }
    }
}

#[tokio::main]
async fn run_server_foreground(config: Config, port: Option<u16>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let port = port.unwrap_or(config.port);
    let state = AppState::from_config(config)?;

    match state.detector.get_recommended_database() {
        Ok(backend) => tracing::info!("Recommended storage backend: {}", backend.name),
        Err(e) => tracing::warn!("{}", e),
    }

    let app = api::create_router(state);
    let addr = format!("0.0.0.0:{port}");

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn handle_export(config: Config, output: Option<PathBuf>) -> Result<()> {
    let state = AppState::from_config(config)?;
    let bundle = state.manager.export_data()?;
    let content = serde_json::to_string_pretty(&bundle)?;

    match output {
        Some(path) => {
            fs::write(&path, content).with_context(|| format!("Failed to write {path:?}"))?;
            eprintln!(
                "Exported {} projects and {} items to {}",
                bundle.projects.len(),
                bundle.items.len(),
                path.display()
            );
        }
        None => println!("{content}"),
    }

    Ok(())
}

fn handle_import(config: Config, file: &Path, migrate: bool) -> Result<()> {
    let content =
        fs::read_to_string(file).with_context(|| format!("Failed to read {file:?}"))?;
    let raw: Value =
        serde_json::from_str(&content).with_context(|| format!("{file:?} is not valid JSON"))?;
    let bundle = ExportBundle::from_value(&raw)?;

    let state = AppState::from_config(config)?;
    let outcome = if migrate {
        state.manager.migrate_from_local_storage(bundle)?
    } else {
        state.manager.import_data(bundle)?
    };

    println!(
        "{} {} projects and {} items",
        if migrate { "Migrated" } else { "Imported" },
        outcome.project_count(),
        outcome.item_count()
    );
    Ok(())
}

fn handle_status(config: Config) -> Result<()> {
    let state = AppState::from_config(config)?;
    let databases = state.detector.detect_all_databases();
    let recommended = recommend(&databases).ok();
    let integrity = state.detector.check_data_integrity()?;

    let report = json!({
        "databases": databases,
        "recommended": recommended,
        "integrity": integrity,
        "timestamp": Utc::now(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
