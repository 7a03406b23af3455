//! In-memory stand-ins for PostgreSQL used by unit tests.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crate::errors::{OpsError, Result};
use crate::maintenance::{Housekeeping, ScheduleStore};
use crate::snapshot::SnapshotTool;
use crate::store::{ArtifactPrefix, BackupStore};
use crate::tasks::{TaskEngine, TaskRegistry};

#[derive(Default)]
pub struct FakeSnapshotTool {
    delay: Option<Duration>,
    fail_dump_for: Option<ArtifactPrefix>,
    fail_restore: bool,
    mutated: AtomicBool,
    restored: Mutex<Vec<String>>,
}

impl FakeSnapshotTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_dump_for(mut self, prefix: ArtifactPrefix) -> Self {
        self.fail_dump_for = Some(prefix);
        self
    }

    pub fn failing_restore(mut self) -> Self {
        self.fail_restore = true;
        self
    }

    pub fn database_mutated(&self) -> bool {
        self.mutated.load(Ordering::SeqCst)
    }

    pub fn restored(&self) -> Vec<String> {
        self.restored.lock().unwrap().clone()
    }
}

fn has_prefix(path: &Path, prefix: ArtifactPrefix) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    match prefix {
        ArtifactPrefix::PreRestore => name.starts_with("pre-restore-backup-"),
        ArtifactPrefix::Backup => name.starts_with("backup-"),
    }
}

#[async_trait]
impl SnapshotTool for FakeSnapshotTool {
    async fn dump(&self, target: &Path) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(prefix) = self.fail_dump_for {
            if has_prefix(target, prefix) {
                return Err(OpsError::ToolFailure {
                    tool: "pg_dump".into(),
                    status: "exit status: 1".into(),
                    stderr: "could not connect to server".into(),
                });
            }
        }
        tokio::fs::write(target, b"-- PostgreSQL database dump\nSELECT 1;\n").await?;
        Ok(())
    }

    async fn restore(&self, source: &Path) -> Result<()> {
        if self.fail_restore {
            return Err(OpsError::ToolFailure {
                tool: "psql".into(),
                status: "exit status: 3".into(),
                stderr: "syntax error at or near".into(),
            });
        }
        self.mutated.store(true, Ordering::SeqCst);
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        self.restored.lock().unwrap().push(name);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeHousekeeping {
    purged: u64,
    fail_optimize: bool,
    fail_purge: bool,
    retention_requested: Mutex<Option<u32>>,
}

impl FakeHousekeeping {
    pub fn with_purged(purged: u64) -> Self {
        Self {
            purged,
            ..Self::default()
        }
    }

    pub fn failing_optimize() -> Self {
        Self {
            fail_optimize: true,
            ..Self::default()
        }
    }

    pub fn failing_purge() -> Self {
        Self {
            fail_purge: true,
            ..Self::default()
        }
    }

    pub fn retention_requested(&self) -> Option<u32> {
        *self.retention_requested.lock().unwrap()
    }
}

#[async_trait]
impl Housekeeping for FakeHousekeeping {
    async fn optimize(&self) -> Result<()> {
        if self.fail_optimize {
            return Err(OpsError::Storage("could not vacuum: disk full".into()));
        }
        Ok(())
    }

    async fn purge_audit_older_than(&self, retention_days: u32) -> Result<u64> {
        *self.retention_requested.lock().unwrap() = Some(retention_days);
        if self.fail_purge {
            return Err(OpsError::Storage(
                "permission denied for table audit_logs".into(),
            ));
        }
        Ok(self.purged)
    }
}

/// Engine rooted in `dir`: artifacts under `backups/`, schedule in `schedule.json`.
pub fn test_engine(
    dir: &TempDir,
    tool: Arc<dyn SnapshotTool>,
    housekeeping: Arc<dyn Housekeeping>,
) -> TaskEngine {
    TaskEngine::new(
        TaskRegistry::new(),
        BackupStore::new(dir.path().join("backups")),
        tool,
        housekeeping,
        Arc::new(ScheduleStore::new(dir.path().join("schedule.json"))),
        90,
    )
}
