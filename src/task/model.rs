//! Task lifecycle state machine and records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Dispatch accepted, no progress event seen yet.
    Pending,
    /// Worker has reported progress.
    Running,
    /// All steps completed.
    Finished,
    /// Dispatch or execution failed.
    Error,
    /// Stopped by a cancel request.
    Cancelled,
}

impl TaskStatus {
    /// Check if this state allows transitioning to another state.
    ///
    /// Same-state writes are allowed for non-terminal states so repeated
    /// events stay idempotent.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Pending, _) | (Running, Running | Finished | Error | Cancelled)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error | Self::Cancelled)
    }

    /// Check if the task counts toward a worker's active load.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A statically configured remote execution endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerNode {
    pub id: String,
    /// Base URL used verbatim for outbound calls.
    pub addr: String,
}

impl WorkerNode {
    pub fn new(id: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            addr: addr.into(),
        }
    }
}

/// One unit of requested work, tracked by identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Worker the task is attributed to.
    pub agent_id: String,
    pub prompt: String,
    pub status: TaskStatus,
    /// Free-form, human-readable step label.
    pub step: String,
    pub progress: u32,
    pub start_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl Task {
    /// Create a freshly dispatched task with a new identity.
    pub fn dispatched(agent_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_task_id(),
            agent_id: agent_id.into(),
            prompt: prompt.into(),
            status: TaskStatus::Pending,
            step: "dispatched".to_string(),
            progress: 0,
            start_time: now,
            last_update: now,
        }
    }

    /// Compare everything except timestamps.
    pub fn same_initial_state(&self, other: &Task) -> bool {
        self.id == other.id
            && self.agent_id == other.agent_id
            && self.prompt == other.prompt
            && self.status == other.status
            && self.step == other.step
            && self.progress == other.progress
    }

    /// Apply a status update in place. Fails without mutating if the task is
    /// already terminal.
    pub(crate) fn apply(
        &mut self,
        agent_id: &str,
        status: TaskStatus,
        step: &str,
        progress: u32,
    ) -> Result<(), TaskStatus> {
        if !self.status.can_transition_to(status) {
            return Err(self.status);
        }

        // Progress never moves backwards within a run.
        let progress = if self.status == TaskStatus::Running && status == TaskStatus::Running {
            progress.max(self.progress)
        } else {
            progress
        };

        self.agent_id = agent_id.to_string();
        self.status = status;
        self.step = step.to_string();
        self.progress = progress;
        self.last_update = Utc::now();
        Ok(())
    }
}

/// Generate a fresh, never-reused task identity.
pub fn new_task_id() -> String {
    format!("task-{}", Uuid::new_v4().simple())
}
