// dietops/src/maintenance/schedule.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::errors::{OpsError, Result};

/// Cron expressions the admin client may choose from.
pub const CRON_PRESETS: &[&str] = &[
    "0 2 * * *",
    "0 0 * * *",
    "0 */6 * * *",
    "0 3 * * 0",
    "0 4 1 * *",
];

const DEFAULT_CRON: &str = "0 2 * * *";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceSchedule {
    pub cron_expression: String,
    pub is_enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
}

impl Default for MaintenanceSchedule {
    fn default() -> Self {
        Self {
            cron_expression: DEFAULT_CRON.to_string(),
            is_enabled: false,
            last_run: None,
        }
    }
}

/// Body of an "update schedule" request; `lastRun` is not client-writable.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    pub cron_expression: String,
    pub is_enabled: bool,
}

pub fn validate_cron_expression(expr: &str) -> Result<()> {
    let normalized = expr.split_whitespace().collect::<Vec<_>>().join(" ");
    if CRON_PRESETS.contains(&normalized.as_str()) {
        Ok(())
    } else {
        Err(OpsError::Validation(format!(
            "cron expression '{}' is not one of the supported presets: {}",
            expr,
            CRON_PRESETS.join(", ")
        )))
    }
}

/// The single schedule record, stored as JSON next to the backups.
#[derive(Debug)]
pub struct ScheduleStore {
    path: PathBuf,
    // serializes read-modify-write cycles within the process
    guard: Mutex<()>,
}

impl ScheduleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self) -> MaintenanceSchedule {
        let _lock = self.guard.lock().await;
        self.read_unlocked().await
    }

    pub async fn update(&self, update: ScheduleUpdate) -> Result<MaintenanceSchedule> {
        validate_cron_expression(&update.cron_expression)?;
        let _lock = self.guard.lock().await;

        let schedule = MaintenanceSchedule {
            cron_expression: update
                .cron_expression
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
            is_enabled: update.is_enabled,
            last_run: self.read_unlocked().await.last_run,
        };
        self.write_unlocked(&schedule).await?;
        info!(
            cron = %schedule.cron_expression,
            enabled = schedule.is_enabled,
            "Maintenance schedule updated"
        );
        Ok(schedule)
    }

    /// Stamps `lastRun`; only a completed maintenance task calls this.
    pub async fn record_run(&self, at: DateTime<Utc>) -> Result<MaintenanceSchedule> {
        let _lock = self.guard.lock().await;
        let mut schedule = self.read_unlocked().await;
        schedule.last_run = Some(at);
        self.write_unlocked(&schedule).await?;
        Ok(schedule)
    }

    async fn read_unlocked(&self) -> MaintenanceSchedule {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return MaintenanceSchedule::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Cannot read schedule, using default: {}", e);
                return MaintenanceSchedule::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), "Corrupt schedule file, using default: {}", e);
            MaintenanceSchedule::default()
        })
    }

    async fn write_unlocked(&self, schedule: &MaintenanceSchedule) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| OpsError::storage(format!("Failed to create {}", dir.display()), e))?;

        let contents = serde_json::to_vec_pretty(schedule)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || persist_atomically(&dir, &path, &contents))
            .await
            .map_err(|e| OpsError::Storage(format!("Schedule writer stopped: {}", e)))?
    }
}

// temp file + rename so a crash never leaves a half-written record
fn persist_atomically(dir: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| OpsError::storage("Failed to create temporary schedule file", e))?;
    tmp.write_all(contents)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| OpsError::storage(format!("Failed to persist {}", path.display()), e.error))?;
    Ok(())
}
