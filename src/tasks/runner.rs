// dietops/src/tasks/runner.rs
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{TaskKind, TaskRegistry};
use crate::errors::Result;

/// Handle an executor uses to publish its stages to the registry.
#[derive(Debug)]
pub struct TaskContext {
    registry: TaskRegistry,
    task_id: String,
    // shared with the supervisor so a panic can still name the stage
    stage: Arc<Mutex<&'static str>>,
}

impl TaskContext {
    fn new(registry: TaskRegistry, task_id: String) -> Self {
        Self {
            registry,
            task_id,
            stage: Arc::new(Mutex::new("Init")),
        }
    }

    #[cfg(test)]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn stage(&self) -> &'static str {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enters a stage: one log line, then the progress bump. The caller does the work afterwards.
    pub fn enter(&mut self, stage: &'static str, progress: i32, message: impl Into<String>) {
        let message = message.into();
        info!(task_id = %self.task_id, stage, progress, "{}", message);
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner) = stage;
        self.registry.append_log(&self.task_id, message);
        self.registry.set_progress(&self.task_id, progress);
    }

    /// Extra detail within the current stage.
    pub fn log(&self, message: impl Into<String>) {
        self.registry.append_log(&self.task_id, message);
    }
}

/// Registers a task and runs `procedure` on its own tokio task.
///
/// The procedure returns the final success line. Its error, or a panic, becomes the
/// terminal failure with the failing stage named in the last log line. Nothing
/// propagates out of the background context.
pub fn launch<F, Fut>(registry: &TaskRegistry, kind: TaskKind, procedure: F) -> (String, JoinHandle<()>)
where
    F: FnOnce(TaskContext) -> Fut + Send + 'static,
    Fut: Future<Output = (TaskContext, Result<String>)> + Send + 'static,
{
    let task_id = registry.create_task(kind);
    let ctx = TaskContext::new(registry.clone(), task_id.clone());
    let stage = Arc::clone(&ctx.stage);
    let registry = registry.clone();
    let id = task_id.clone();

    let handle = tokio::spawn(async move {
        let work = tokio::spawn(procedure(ctx));
        match work.await {
            Ok((_, Ok(summary))) => {
                info!(task_id = %id, %kind, "Task finished: {}", summary);
                registry.complete(&id, summary);
            }
            Ok((ctx, Err(e))) => {
                let message = format!("{} stage failed: {}", ctx.stage(), e);
                error!(task_id = %id, %kind, "{}", message);
                registry.fail(&id, message);
            }
            Err(join_err) => {
                let stage = *stage.lock().unwrap_or_else(PoisonError::into_inner);
                let message = format!(
                    "{} stage failed: {} task aborted unexpectedly: {}",
                    stage, kind, join_err
                );
                error!(task_id = %id, "{}", message);
                registry.fail(&id, message);
            }
        }
    });

    (task_id, handle)
}
