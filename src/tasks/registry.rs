// dietops/src/tasks/registry.rs
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use super::{LogEntry, PROGRESS_DONE, PROGRESS_FAILED, TaskKind, TaskStatus};

#[derive(Debug)]
struct TaskRecord {
    kind: TaskKind,
    progress: i32,
    log: Vec<LogEntry>,
    completed: bool,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    fn snapshot(&self) -> TaskStatus {
        TaskStatus {
            progress: self.progress,
            log: self.log.clone(),
            completed: self.completed,
            kind: Some(self.kind),
            started_at: Some(self.started_at),
            finished_at: self.finished_at,
        }
    }

    fn finish(&mut self, progress: i32, message: Option<String>) {
        let now = Utc::now();
        if let Some(message) = message {
            self.log.push(LogEntry {
                timestamp: now,
                message,
            });
        }
        self.progress = progress;
        self.completed = true;
        self.finished_at = Some(now);
    }
}

/// In-memory map from task id to live progress.
///
/// Cloning is cheap and every clone shares the same map. All mutations take the
/// write lock for their full duration, so a reader never sees `completed` without
/// the matching terminal progress. Entries are never evicted.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<String, TaskRecord>>>,
    sequence: Arc<AtomicU64>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, TaskRecord>> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, TaskRecord>> {
        self.tasks.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_task(&self, kind: TaskKind) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let now = Utc::now();
        let id = format!("{}_{}_{}", kind, now.timestamp_millis(), seq);
        self.write().insert(
            id.clone(),
            TaskRecord {
                kind,
                progress: 0,
                log: Vec::new(),
                completed: false,
                started_at: now,
                finished_at: None,
            },
        );
        debug!(task_id = %id, "Task registered");
        id
    }

    pub fn append_log(&self, task_id: &str, message: impl Into<String>) {
        let mut tasks = self.write();
        match tasks.get_mut(task_id) {
            Some(task) if task.completed => {
                warn!(task_id, "Ignoring log line for a finished task");
            }
            Some(task) => task.log.push(LogEntry {
                timestamp: Utc::now(),
                message: message.into(),
            }),
            None => warn!(task_id, "Ignoring log line for an unknown task"),
        }
    }

    /// Moves progress forward. Terminal values also mark the task completed.
    /// Regressions, out-of-range values and writes to finished tasks are dropped.
    pub fn set_progress(&self, task_id: &str, value: i32) {
        let mut tasks = self.write();
        let Some(task) = tasks.get_mut(task_id) else {
            warn!(task_id, "Ignoring progress for an unknown task");
            return;
        };
        if task.completed {
            warn!(task_id, value, "Ignoring progress for a finished task");
            return;
        }
        match value {
            PROGRESS_FAILED | PROGRESS_DONE => task.finish(value, None),
            v if (0..PROGRESS_DONE).contains(&v) && v >= task.progress => task.progress = v,
            v => warn!(task_id, value = v, current = task.progress, "Rejected progress update"),
        }
    }

    /// Appends the final log line and marks success in one update.
    pub fn complete(&self, task_id: &str, message: impl Into<String>) {
        self.finish(task_id, PROGRESS_DONE, message.into());
    }

    /// Appends the final log line and marks failure in one update.
    pub fn fail(&self, task_id: &str, message: impl Into<String>) {
        self.finish(task_id, PROGRESS_FAILED, message.into());
    }

    fn finish(&self, task_id: &str, progress: i32, message: String) {
        let mut tasks = self.write();
        match tasks.get_mut(task_id) {
            Some(task) if task.completed => {
                warn!(task_id, "Task already finished; dropping terminal update: {}", message);
            }
            Some(task) => task.finish(progress, Some(message)),
            None => warn!(task_id, "Ignoring terminal update for an unknown task"),
        }
    }

    pub fn get_status(&self, task_id: &str) -> TaskStatus {
        self.read()
            .get(task_id)
            .map(TaskRecord::snapshot)
            .unwrap_or_else(TaskStatus::unknown)
    }

    #[cfg(test)]
    pub fn contains(&self, task_id: &str) -> bool {
        self.read().contains_key(task_id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_starts_at_zero() {
        let registry = TaskRegistry::new();
        let id = registry.create_task(TaskKind::Backup);
        let status = registry.get_status(&id);

        assert!(id.starts_with("backup_"));
        assert_eq!(status.progress, 0);
        assert!(status.log.is_empty());
        assert!(!status.completed);
        assert_eq!(status.kind, Some(TaskKind::Backup));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let registry = TaskRegistry::new();
        let ids: std::collections::HashSet<String> = (0..100)
            .map(|_| registry.create_task(TaskKind::Maintenance))
            .collect();
        assert_eq!(ids.len(), 100);
        assert_eq!(registry.len(), 100);
    }

    #[test]
    fn test_unknown_id_reads_as_zero_state() {
        let registry = TaskRegistry::new();
        assert_eq!(registry.get_status("backup_0_0"), TaskStatus::unknown());

        // writes to unknown ids are harmless
        registry.append_log("nope", "hello");
        registry.set_progress("nope", 50);
        registry.fail("nope", "boom");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_log_preserves_insertion_order() {
        let registry = TaskRegistry::new();
        let id = registry.create_task(TaskKind::Restore);
        for i in 0..10 {
            registry.append_log(&id, format!("line {}", i));
        }
        let messages: Vec<String> = registry
            .get_status(&id)
            .log
            .into_iter()
            .map(|e| e.message)
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("line {}", i)).collect();
        assert_eq!(messages, expected);
    }

    #[test]
    fn test_terminal_progress_sets_completed() {
        let registry = TaskRegistry::new();
        let done = registry.create_task(TaskKind::Backup);
        let failed = registry.create_task(TaskKind::Backup);

        registry.set_progress(&done, 100);
        registry.set_progress(&failed, -1);

        assert!(registry.get_status(&done).succeeded());
        assert!(registry.get_status(&failed).failed());
        assert!(registry.get_status(&done).finished_at.is_some());
    }

    #[test]
    fn test_terminal_state_is_frozen() {
        let registry = TaskRegistry::new();
        let id = registry.create_task(TaskKind::Backup);
        registry.set_progress(&id, 50);
        registry.fail(&id, "Dump stage failed: pg_dump exited 1");
        let frozen = registry.get_status(&id);

        registry.set_progress(&id, 80);
        registry.set_progress(&id, 100);
        registry.append_log(&id, "late line");
        registry.complete(&id, "late success");

        assert_eq!(registry.get_status(&id), frozen);
        assert_eq!(frozen.progress, -1);
        assert_eq!(
            frozen.log.last().map(|e| e.message.as_str()),
            Some("Dump stage failed: pg_dump exited 1")
        );
    }

    #[test]
    fn test_progress_never_decreases() {
        let registry = TaskRegistry::new();
        let id = registry.create_task(TaskKind::Maintenance);
        registry.set_progress(&id, 50);
        registry.set_progress(&id, 20);
        assert_eq!(registry.get_status(&id).progress, 50);

        registry.set_progress(&id, 250);
        registry.set_progress(&id, -7);
        assert_eq!(registry.get_status(&id).progress, 50);
        assert!(!registry.get_status(&id).completed);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_terminal_state() {
        let registry = TaskRegistry::new();
        let id = registry.create_task(TaskKind::Backup);

        let reader = {
            let registry = registry.clone();
            let id = id.clone();
            std::thread::spawn(move || {
                let mut last = 0;
                for _ in 0..10_000 {
                    let status = registry.get_status(&id);
                    if status.completed {
                        assert_eq!(status.progress, 100);
                        assert_eq!(
                            status.log.last().map(|e| e.message.as_str()),
                            Some("done")
                        );
                    } else {
                        assert!(status.progress >= last);
                        last = status.progress;
                    }
                }
            })
        };

        for p in (0..100).step_by(5) {
            registry.append_log(&id, format!("at {}", p));
            registry.set_progress(&id, p);
        }
        registry.complete(&id, "done");
        reader.join().unwrap();
    }
}
