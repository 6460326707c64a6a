//! Thread-safe store of every known task.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{Task, TaskError, TaskStatus};

/// A stored task plus its insertion sequence number, used to keep listing
/// order stable when two tasks share a `created_at` stamp.
#[derive(Debug)]
struct Entry {
    seq: u64,
    task: Task,
}

#[derive(Debug, Default)]
struct Inner {
    tasks: HashMap<String, Entry>,
    next_seq: u64,
}

/// Maps task IDs to tasks behind a single mutex.
///
/// The lock is only held for in-memory map access; nothing in this type
/// awaits or blocks while holding it. Reads hand out clones so that no
/// reference into the map escapes the lock.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `task`, failing with [`TaskError::DuplicateId`] if its ID is taken.
    pub fn insert(&self, task: Task) -> Result<(), TaskError> {
        let mut inner = self.inner.lock();
        if inner.tasks.contains_key(&task.id) {
            return Err(TaskError::DuplicateId(task.id));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.tasks.insert(task.id.clone(), Entry { seq, task });
        Ok(())
    }

    /// Returns a snapshot of the task with the given ID.
    pub fn get(&self, id: &str) -> Result<Task, TaskError> {
        self.inner
            .lock()
            .tasks
            .get(id)
            .map(|entry| entry.task.clone())
            .ok_or_else(|| TaskError::NotFound(id.to_owned()))
    }

    /// Removes the task with the given ID. Absent IDs are ignored.
    pub fn remove(&self, id: &str) {
        self.inner.lock().tasks.remove(id);
    }

    /// Runs `f` against the stored task while holding the lock.
    ///
    /// `f` must not block; it is the only way to mutate a registered task.
    pub fn update<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Task) -> Result<R, TaskError>,
    ) -> Result<R, TaskError> {
        let mut inner = self.inner.lock();
        let entry = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_owned()))?;
        f(&mut entry.task)
    }

    /// Lists tasks matching `status` (all tasks when `None`), oldest first.
    ///
    /// Returns up to `count` tasks starting at `offset` within the sorted
    /// matches, together with the number of matches before pagination.
    pub fn list_filtered(
        &self,
        status: Option<TaskStatus>,
        offset: usize,
        count: usize,
    ) -> (Vec<Task>, usize) {
        let mut matches: Vec<(u64, Task)> = {
            let inner = self.inner.lock();
            inner
                .tasks
                .values()
                .filter(|entry| status.is_none_or(|s| entry.task.status == s))
                .map(|entry| (entry.seq, entry.task.clone()))
                .collect()
        };

        matches.sort_by(|(a_seq, a), (b_seq, b)| {
            a.created_at.cmp(&b.created_at).then(a_seq.cmp(b_seq))
        });

        let total = matches.len();
        let page = matches
            .into_iter()
            .skip(offset)
            .take(count)
            .map(|(_, task)| task)
            .collect();
        (page, total)
    }

    /// Returns the number of registered tasks.
    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    /// Returns `true` if no tasks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
