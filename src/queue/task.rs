//! The task entity and its status state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a [`Task`].
///
/// Permitted transitions:
///
/// ```text
/// pending ──▶ processing ──▶ done
///                 │
///                 ▼
///  pending ◀── failed   (manual retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Registered and waiting in the queue.
    Pending,
    /// Picked up by the worker.
    Processing,
    /// Finished successfully. Terminal.
    Done,
    /// Finished unsuccessfully. Can be retried.
    Failed,
}

impl TaskStatus {
    /// Returns the lowercase wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Done)
                | (Self::Processing, Self::Failed)
                | (Self::Failed, Self::Pending)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a [`TaskStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown task status: {0:?}")]
pub struct ParseStatusError(pub String);

impl FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(ParseStatusError(other.to_owned())),
        }
    }
}

/// One unit of work, as stored in the registry.
///
/// Callers only ever see snapshots (clones) of a task; the authoritative copy
/// lives inside the [`Registry`](super::Registry) and is mutated under its lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub data: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new `pending` task stamped with the current time.
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            data: data.into(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the task to `next` if the state machine allows it.
    ///
    /// Returns `false`, leaving the task untouched, when the transition is illegal.
    pub fn transition(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.touch();
        true
    }

    /// Sets `status` without consulting the state machine.
    ///
    /// Reserved for the fault-isolation path and for reverting a retry that
    /// could not be enqueued.
    pub(crate) fn force_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.touch();
    }

    // Wall clocks can step backwards; `updated_at` never precedes the last stamp.
    fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
    }
}
