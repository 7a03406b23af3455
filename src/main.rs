//! Dietary back-office operations service
//!
//! Serves the admin API for database backups, restores and maintenance, or runs
//! one of those operations in the foreground from the command line.

// dietops/src/main.rs
mod api;
mod backup;
mod config;
mod errors;
mod maintenance;
mod restore;
mod snapshot;
mod store;
mod tasks;
mod utils;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use api::AppState;
use config::{AppConfig, redact_db_url};
use maintenance::{PgHousekeeping, ScheduleStore};
use snapshot::PgSnapshotTool;
use store::BackupStore;
use tasks::{TaskEngine, TaskRegistry};
use utils::format_bytes;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run_app().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    dotenv::dotenv().ok();

    let config_path = env::var("OPS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = AppConfig::load(&config_path).context(format!(
        "Failed to load application configuration from {}",
        config_path.display()
    ))?;
    info!(
        database = %redact_db_url(&config.database_url),
        backup_dir = %config.backup_dir.display(),
        "Configuration loaded"
    );

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(|s| s.trim()).unwrap_or("serve");
    let engine = build_engine(&config)?;

    match command {
        "serve" => {
            let admin_token = config
                .admin_token
                .clone()
                .context("admin_token (or OPS_ADMIN_TOKEN) must be set to serve the admin API")?;
            engine
                .store()
                .ensure_directory()
                .await
                .context("Backup directory is not usable")?;
            let state = Arc::new(AppState {
                engine,
                admin_token: Some(admin_token),
            });
            api::start_server(state, &config.listen_addr).await?;
        }
        "backup" => {
            let (task_id, handle) = engine.start_backup();
            run_foreground(&engine, task_id, handle).await?;
        }
        "restore" => {
            let filename = args
                .get(2)
                .context("Usage: dietops restore <backup filename>")?;
            let (task_id, handle) = engine
                .start_restore(filename)
                .await
                .context("Restore request rejected")?;
            run_foreground(&engine, task_id, handle).await?;
        }
        "maintenance" => {
            let (task_id, handle) = engine.start_maintenance();
            run_foreground(&engine, task_id, handle).await?;
        }
        "list" => {
            let artifacts = engine.store().list().await;
            if artifacts.is_empty() {
                println!("No backups found in {}", engine.store().dir().display());
            }
            for artifact in artifacts {
                println!(
                    "{}\t{}\t{}",
                    artifact.name,
                    format_bytes(artifact.size_bytes),
                    artifact.created_at.to_rfc3339()
                );
            }
        }
        other => {
            println!("Usage: dietops [serve|backup|restore <filename>|maintenance|list]");
            anyhow::bail!("Invalid command '{}'", other);
        }
    }
    Ok(())
}

fn build_engine(config: &AppConfig) -> Result<TaskEngine> {
    let tool = PgSnapshotTool::from_config(config).context("PostgreSQL client tools unavailable")?;
    let housekeeping =
        PgHousekeeping::from_config(config).context("Failed to prepare database connection pool")?;

    Ok(TaskEngine::new(
        TaskRegistry::new(),
        BackupStore::new(config.backup_dir.clone()),
        Arc::new(tool),
        Arc::new(housekeeping),
        Arc::new(ScheduleStore::new(config.schedule_file.clone())),
        config.audit_retention_days,
    ))
}

/// Waits for a task started from the command line and prints its log.
async fn run_foreground(engine: &TaskEngine, task_id: String, handle: JoinHandle<()>) -> Result<()> {
    handle
        .await
        .context("Task runner terminated unexpectedly")?;

    let status = engine.status(&task_id);
    for entry in &status.log {
        println!("[{}] {}", entry.timestamp.format("%Y-%m-%d %H:%M:%S"), entry.message);
    }

    if status.succeeded() {
        Ok(())
    } else {
        let reason = status
            .log
            .last()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "no log output".to_string());
        anyhow::bail!("Task {} failed: {}", task_id, reason)
    }
}
