// dietops/src/snapshot/pg_tools.rs
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::SnapshotTool;
use crate::config::{AppConfig, redact_db_url};
use crate::errors::{OpsError, Result};
use crate::utils::find_executable;

/// `pg_dump` / `psql` pair bound to one database URL.
#[derive(Debug, Clone)]
pub struct PgSnapshotTool {
    db_url: String,
    pg_dump_path: PathBuf,
    psql_path: PathBuf,
}

impl PgSnapshotTool {
    pub fn new(db_url: impl Into<String>, pg_dump_path: PathBuf, psql_path: PathBuf) -> Self {
        Self {
            db_url: db_url.into(),
            pg_dump_path,
            psql_path,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let pg_dump_path = find_executable("pg_dump", config.pg_dump_path.as_ref())?;
        let psql_path = find_executable("psql", config.psql_path.as_ref())?;
        info!(
            pg_dump = %pg_dump_path.display(),
            psql = %psql_path.display(),
            "Resolved PostgreSQL client tools"
        );
        Ok(Self::new(config.database_url.clone(), pg_dump_path, psql_path))
    }
}

fn check_output(tool: &str, output: Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stderr = if stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr
    };
    Err(OpsError::ToolFailure {
        tool: tool.to_string(),
        status: output.status.to_string(),
        stderr,
    })
}

#[async_trait]
impl SnapshotTool for PgSnapshotTool {
    async fn dump(&self, target: &Path) -> Result<()> {
        info!(
            target = %target.display(),
            database = %redact_db_url(&self.db_url),
            "Running pg_dump"
        );

        let result = Command::new(&self.pg_dump_path)
            .arg("--clean")
            .arg("--if-exists")
            .arg("--no-owner")
            .arg("-f")
            .arg(target)
            .arg(&self.db_url)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| OpsError::tool_spawn("pg_dump", e))
            .and_then(|output| check_output("pg_dump", output));

        if result.is_err() {
            // never leave a truncated snapshot behind
            if let Err(e) = tokio::fs::remove_file(target).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(target = %target.display(), "Failed to remove partial dump: {}", e);
                }
            }
            return result;
        }

        debug!(target = %target.display(), "pg_dump finished");
        Ok(())
    }

    async fn restore(&self, source: &Path) -> Result<()> {
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(OpsError::NotFound(format!(
                "snapshot file {}",
                source.display()
            )));
        }

        info!(
            source = %source.display(),
            database = %redact_db_url(&self.db_url),
            "Applying snapshot with psql"
        );

        let output = Command::new(&self.psql_path)
            .arg("-X") // Do not read psqlrc
            .arg("-q")
            .arg("-v")
            .arg("ON_ERROR_STOP=1")
            .arg("-d")
            .arg(&self.db_url)
            .arg("-f")
            .arg(source)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| OpsError::tool_spawn("psql", e))?;

        check_output("psql", output)?;
        debug!(source = %source.display(), "psql finished");
        Ok(())
    }
}
