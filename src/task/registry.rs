//! Task registry: the orchestrator's single source of truth for task state.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::model::{Task, TaskStatus};
use crate::error::RegistryError;

/// Concurrency-safe store of all known tasks.
///
/// Every operation is a single critical section on one readers-writer lock.
/// Tasks are never removed.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new task.
    ///
    /// Re-inserting an identical initial record is a no-op; any other record
    /// under an existing identity is a conflict.
    pub async fn create(&self, task: Task) -> Result<Task, RegistryError> {
        let mut tasks = self.tasks.write().await;

        if let Some(existing) = tasks.get(&task.id) {
            if existing.same_initial_state(&task) {
                return Ok(existing.clone());
            }
            return Err(RegistryError::Conflict { id: task.id });
        }

        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    /// Create or update a task's status.
    ///
    /// Unknown identities are materialized on first sight. Terminal tasks are
    /// left untouched and reported as `AlreadyTerminal`; any other disallowed
    /// move (running back to pending) is `InvalidTransition`.
    pub async fn upsert_status(
        &self,
        id: &str,
        agent_id: &str,
        status: TaskStatus,
        step: &str,
        progress: u32,
    ) -> Result<Task, RegistryError> {
        let mut tasks = self.tasks.write().await;

        let task = tasks.entry(id.to_string()).or_insert_with(|| {
            debug!(task_id = %id, agent = %agent_id, "Materializing unknown task from event");
            let now = Utc::now();
            Task {
                id: id.to_string(),
                agent_id: agent_id.to_string(),
                prompt: String::new(),
                status: TaskStatus::Pending,
                step: String::new(),
                progress: 0,
                start_time: now,
                last_update: now,
            }
        });

        task.apply(agent_id, status, step, progress)
            .map_err(|current| {
                let id = id.to_string();
                if current.is_terminal() {
                    RegistryError::AlreadyTerminal {
                        id,
                        status: current,
                        target: status,
                    }
                } else {
                    RegistryError::InvalidTransition {
                        id,
                        status: current,
                        target: status,
                    }
                }
            })?;

        Ok(task.clone())
    }

    /// Point-in-time copy of every task, oldest first.
    pub async fn list_all(&self) -> Vec<Task> {
        let mut snapshot: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        snapshot.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        snapshot
    }

    /// Get a task by identity.
    pub async fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}
