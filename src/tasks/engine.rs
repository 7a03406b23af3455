// dietops/src/tasks/engine.rs
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use super::runner::launch;
use super::{TaskKind, TaskRegistry, TaskStatus};
use crate::backup::run_backup;
use crate::errors::Result;
use crate::maintenance::{Housekeeping, ScheduleStore, run_maintenance};
use crate::restore::run_restore;
use crate::snapshot::SnapshotTool;
use crate::store::{BackupStore, validate_artifact_name};

/// Entry point for starting operational tasks. Every `start_*` returns as soon as
/// the task is registered; the work continues on a spawned tokio task.
pub struct TaskEngine {
    registry: TaskRegistry,
    store: BackupStore,
    tool: Arc<dyn SnapshotTool>,
    housekeeping: Arc<dyn Housekeeping>,
    schedule: Arc<ScheduleStore>,
    audit_retention_days: u32,
}

impl TaskEngine {
    pub fn new(
        registry: TaskRegistry,
        store: BackupStore,
        tool: Arc<dyn SnapshotTool>,
        housekeeping: Arc<dyn Housekeeping>,
        schedule: Arc<ScheduleStore>,
        audit_retention_days: u32,
    ) -> Self {
        Self {
            registry,
            store,
            tool,
            housekeeping,
            schedule,
            audit_retention_days,
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn store(&self) -> &BackupStore {
        &self.store
    }

    pub fn schedule(&self) -> &ScheduleStore {
        &self.schedule
    }

    pub fn status(&self, task_id: &str) -> TaskStatus {
        self.registry.get_status(task_id)
    }

    pub fn start_backup(&self) -> (String, JoinHandle<()>) {
        let store = self.store.clone();
        let tool = Arc::clone(&self.tool);
        let (task_id, handle) = launch(&self.registry, TaskKind::Backup, move |mut ctx| async move {
            let result = run_backup(&mut ctx, &store, tool.as_ref()).await;
            (ctx, result)
        });
        info!(task_id = %task_id, "Backup task started");
        (task_id, handle)
    }

    /// Rejects malformed or unknown artifact names before any task exists.
    pub async fn start_restore(&self, artifact: &str) -> Result<(String, JoinHandle<()>)> {
        validate_artifact_name(artifact)?;
        self.store.stat(artifact).await?;

        let store = self.store.clone();
        let tool = Arc::clone(&self.tool);
        let artifact = artifact.to_string();
        let (task_id, handle) = launch(&self.registry, TaskKind::Restore, move |mut ctx| async move {
            let result = run_restore(&mut ctx, &store, tool.as_ref(), &artifact).await;
            (ctx, result)
        });
        info!(task_id = %task_id, "Restore task started");
        Ok((task_id, handle))
    }

    pub fn start_maintenance(&self) -> (String, JoinHandle<()>) {
        let db = Arc::clone(&self.housekeeping);
        let schedule = Arc::clone(&self.schedule);
        let retention_days = self.audit_retention_days;
        let (task_id, handle) = launch(&self.registry, TaskKind::Maintenance, move |mut ctx| async move {
            let result = run_maintenance(&mut ctx, db.as_ref(), &schedule, retention_days).await;
            (ctx, result)
        });
        info!(task_id = %task_id, "Maintenance task started");
        (task_id, handle)
    }
}
