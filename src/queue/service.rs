//! Admission, listing, and retry policy over the registry and queue.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{BoundedQueue, Registry, Task, TaskError, TaskStatus, id};

/// Page used when the caller supplies none (or a non-positive one).
pub const DEFAULT_PAGE: usize = 1;

/// Page size used when the caller supplies none (or a non-positive one).
pub const DEFAULT_LIMIT: usize = 20;

/// How long [`TaskService::add_task`] waits for a queue slot by default.
pub const DEFAULT_ADMISSION_TIMEOUT: Duration = Duration::from_secs(1);

/// One page of [`TaskService::list_tasks`] output.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    /// Effective 1-based page number after defaulting.
    pub page: usize,
    /// Effective page size after defaulting.
    pub limit: usize,
    /// Number of matching tasks before pagination.
    pub total: usize,
}

impl TaskPage {
    /// Number of tasks on this page.
    pub fn count(&self) -> usize {
        self.tasks.len()
    }
}

/// The single entry point for state changes coming from outside the core.
///
/// Owns the [`Registry`] and the [`BoundedQueue`]; share it behind an
/// [`Arc`](std::sync::Arc) between request handlers and the
/// [`Worker`](super::Worker).
#[derive(Debug)]
pub struct TaskService {
    registry: Registry,
    queue: BoundedQueue,
    admission_timeout: Duration,
}

impl TaskService {
    /// Creates a service whose queue holds at most `capacity` tasks.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Registry::new(),
            queue: BoundedQueue::new(capacity),
            admission_timeout: DEFAULT_ADMISSION_TIMEOUT,
        }
    }

    /// Overrides how long admission waits for a free queue slot.
    #[must_use]
    pub fn with_admission_timeout(mut self, timeout: Duration) -> Self {
        self.admission_timeout = timeout;
        self
    }

    /// Registers a task and places it on the queue.
    ///
    /// `data` and `id` are trimmed. An empty `id` is replaced by a generated
    /// one. If no queue slot frees up within the admission timeout the task
    /// is removed again and [`TaskError::QueueFull`] is returned, so a task is
    /// never left listed without being reachable by the worker.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Validation`]: `data` is empty after trimming.
    /// - [`TaskError::DuplicateId`]: a task with this `id` already exists.
    /// - [`TaskError::QueueFull`]: the queue stayed full for the whole timeout.
    pub async fn add_task(&self, id: Option<&str>, data: &str) -> Result<Task, TaskError> {
        let data = data.trim();
        if data.is_empty() {
            return Err(TaskError::Validation("data field is required".into()));
        }

        let id = match id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_owned(),
            _ => id::generate(),
        };

        let task = Task::new(id, data);
        self.registry.insert(task.clone())?;

        if let Err(err) = self
            .queue
            .send_timeout(task.id.clone(), self.admission_timeout)
            .await
        {
            self.registry.remove(&task.id);
            warn!(task_id = %task.id, "queue full, admission rolled back");
            return Err(err);
        }

        info!(task_id = %task.id, "task queued");
        Ok(task)
    }

    /// Returns one page of tasks, oldest first.
    ///
    /// `status` of `None` or `""` lists everything; a string that is not a
    /// known status matches nothing. `page` and `limit` fall back to
    /// [`DEFAULT_PAGE`] and [`DEFAULT_LIMIT`] when absent or non-positive.
    pub fn list_tasks(&self, status: Option<&str>, page: Option<i64>, limit: Option<i64>) -> TaskPage {
        let page = positive_or(page, DEFAULT_PAGE);
        let limit = positive_or(limit, DEFAULT_LIMIT);

        let filter = match status.map(str::trim).filter(|s| !s.is_empty()) {
            None => None,
            Some(raw) => match raw.parse::<TaskStatus>() {
                Ok(status) => Some(status),
                Err(err) => {
                    debug!(error = %err, "unknown status filter");
                    return TaskPage {
                        tasks: Vec::new(),
                        page,
                        limit,
                        total: 0,
                    };
                }
            },
        };

        let offset = (page - 1).saturating_mul(limit);
        let (tasks, total) = self.registry.list_filtered(filter, offset, limit);
        TaskPage {
            tasks,
            page,
            limit,
            total,
        }
    }

    /// Re-queues a failed task.
    ///
    /// Never waits for queue space: if the queue is full the task goes back
    /// to `failed` and can be retried later.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`]: no task has this `id`.
    /// - [`TaskError::InvalidState`]: the task is not `failed`.
    /// - [`TaskError::QueueFull`]: no queue slot was free.
    pub fn retry_task(&self, id: &str) -> Result<Task, TaskError> {
        let id = id.trim();
        let task = self.registry.update(id, |task| {
            if task.status != TaskStatus::Failed || !task.transition(TaskStatus::Pending) {
                return Err(TaskError::InvalidState {
                    id: task.id.clone(),
                    status: task.status,
                });
            }
            Ok(task.clone())
        })?;

        if let Err(err) = self.queue.try_send(task.id.clone()) {
            self.registry.update(id, |task| {
                task.force_status(TaskStatus::Failed);
                Ok(())
            })?;
            warn!(task_id = %id, "queue full, retry reverted");
            return Err(err);
        }

        info!(task_id = %id, "task retried");
        Ok(task)
    }

    /// Unconditionally marks a task as `failed`.
    ///
    /// Used by the worker when processing ends abnormally. Callers outside the
    /// crate reach `failed` only through the worker.
    pub(crate) fn mark_failed(&self, id: &str) -> Result<(), TaskError> {
        self.registry.update(id, |task| {
            task.force_status(TaskStatus::Failed);
            Ok(())
        })
    }

    /// Returns a snapshot of a single task.
    pub fn get_task(&self, id: &str) -> Result<Task, TaskError> {
        self.registry.get(id)
    }

    /// Moves a dequeued task from `pending` to `processing`.
    ///
    /// Returns `None` if the task is unknown or not pending.
    pub(crate) fn begin_processing(&self, id: &str) -> Option<Task> {
        let result = self.registry.update(id, |task| {
            if task.transition(TaskStatus::Processing) {
                Ok(Some(task.clone()))
            } else {
                Ok(None)
            }
        });
        match result {
            Ok(Some(task)) => Some(task),
            Ok(None) => {
                warn!(task_id = %id, "dequeued task is not pending, skipping");
                None
            }
            Err(err) => {
                warn!(task_id = %id, error = %err, "dequeued unknown task");
                None
            }
        }
    }

    /// Moves a `processing` task to its terminal `status`.
    pub(crate) fn resolve(&self, id: &str, status: TaskStatus) -> Result<(), TaskError> {
        self.registry.update(id, |task| {
            if task.transition(status) {
                Ok(())
            } else {
                Err(TaskError::InvalidState {
                    id: task.id.clone(),
                    status: task.status,
                })
            }
        })
    }

    pub(crate) async fn next_queued(&self) -> Option<String> {
        self.queue.receive().await
    }

    /// Number of tasks waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Fixed capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Number of tasks ever admitted and still registered.
    pub fn registered(&self) -> usize {
        self.registry.len()
    }
}

fn positive_or(value: Option<i64>, default: usize) -> usize {
    value
        .filter(|v| *v > 0)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}
