//! Asynchronous operational tasks: the shared progress registry, the runner that
//! drives executors on their own tokio tasks, and the engine the API talks to.

pub(crate) mod engine;
pub(crate) mod registry;
pub(crate) mod runner;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

pub use engine::TaskEngine;
pub use registry::TaskRegistry;
pub use runner::TaskContext;

/// Progress value of a task that finished successfully.
pub const PROGRESS_DONE: i32 = 100;
/// Progress value of a task that failed. Never used for anything else.
pub const PROGRESS_FAILED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Backup,
    Restore,
    Maintenance,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Backup => "backup",
            TaskKind::Restore => "restore",
            TaskKind::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Snapshot of one task as seen by a poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub progress: i32,
    pub log: Vec<LogEntry>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<TaskKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskStatus {
    /// What pollers receive for an id the registry has never seen.
    pub fn unknown() -> Self {
        Self {
            progress: 0,
            log: Vec::new(),
            completed: false,
            kind: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.completed && self.progress == PROGRESS_DONE
    }

    #[cfg(test)]
    pub fn failed(&self) -> bool {
        self.completed && self.progress == PROGRESS_FAILED
    }
}
