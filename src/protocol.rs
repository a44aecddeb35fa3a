//! JSON wire types exchanged between orchestrator and workers.

use serde::{Deserialize, Serialize};

use crate::task::TaskStatus;

/// `POST /command` body on the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub text: String,
}

/// `POST /run` body on a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub prompt: String,
}

/// `POST /cancel` body on a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub task_id: String,
}

/// Lifecycle/progress notification pushed from a worker to `POST /event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub task_id: String,
    pub agent_id: String,
    pub status: TaskStatus,
    pub step: String,
    pub progress: u32,
}

impl TaskEvent {
    pub fn new(
        task_id: impl Into<String>,
        agent_id: impl Into<String>,
        status: TaskStatus,
        step: impl Into<String>,
        progress: u32,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            status,
            step: step.into(),
            progress,
        }
    }
}
