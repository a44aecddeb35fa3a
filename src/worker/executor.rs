//! Worker executor: cancellable multi-step task units.
//!
//! Each accepted task runs as its own spawned unit, detached from the request
//! that started it. Cancellation is cooperative and only observed between
//! steps.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::reporter::EventReporter;
use crate::error::ExecutorError;
use crate::protocol::TaskEvent;
use crate::task::TaskStatus;

/// Shape of the simulated job.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionPlan {
    pub steps: u32,
    /// Wait before each step completes.
    pub step_interval: Duration,
}

impl Default for ExecutionPlan {
    fn default() -> Self {
        Self {
            steps: 5,
            step_interval: Duration::from_secs(2),
        }
    }
}

/// Runs tasks and tracks their cancellation handles.
pub struct Executor {
    agent_id: String,
    plan: ExecutionPlan,
    reporter: Arc<dyn EventReporter>,
    /// Outstanding handles, one per running task.
    handles: Arc<RwLock<HashMap<String, CancellationToken>>>,
    /// Every spawned unit, including ones still emitting their terminal event.
    tracker: TaskTracker,
}

impl Executor {
    pub fn new(
        agent_id: impl Into<String>,
        plan: ExecutionPlan,
        reporter: Arc<dyn EventReporter>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            plan,
            reporter,
            handles: Arc::new(RwLock::new(HashMap::new())),
            tracker: TaskTracker::new(),
        }
    }

    /// Schedule a task and return immediately.
    pub async fn start(&self, task_id: &str, prompt: &str) -> Result<(), ExecutorError> {
        let token = CancellationToken::new();
        {
            let mut handles = self.handles.write().await;
            if handles.contains_key(task_id) {
                return Err(ExecutorError::AlreadyRunning {
                    id: task_id.to_string(),
                });
            }
            handles.insert(task_id.to_string(), token.clone());
        }

        info!(task_id = %task_id, prompt = %prompt, "Task accepted");

        let unit = TaskUnit {
            task_id: task_id.to_string(),
            agent_id: self.agent_id.clone(),
            plan: self.plan,
            reporter: Arc::clone(&self.reporter),
            handles: Arc::clone(&self.handles),
            token,
        };
        self.tracker.spawn(unit.run());

        Ok(())
    }

    /// Signal a running task to stop at its next step boundary.
    ///
    /// A task whose cancellation is already pending counts as not running.
    pub async fn cancel(&self, task_id: &str) -> Result<(), ExecutorError> {
        let handles = self.handles.read().await;
        let token = handles
            .get(task_id)
            .filter(|token| !token.is_cancelled())
            .ok_or_else(|| ExecutorError::NotRunning {
                id: task_id.to_string(),
            })?;
        token.cancel();
        info!(task_id = %task_id, "Cancellation signalled");
        Ok(())
    }

    pub async fn is_running(&self, task_id: &str) -> bool {
        self.handles.read().await.contains_key(task_id)
    }

    pub async fn running_count(&self) -> usize {
        self.handles.read().await.len()
    }

    pub async fn running_tasks(&self) -> Vec<String> {
        self.handles.read().await.keys().cloned().collect()
    }

    /// Cancel every outstanding task and wait up to `grace` for the units to
    /// report their terminal events.
    ///
    /// Returns `false` if some unit was still running when `grace` elapsed.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        {
            let handles = self.handles.read().await;
            for token in handles.values() {
                token.cancel();
            }
            if !handles.is_empty() {
                info!(count = handles.len(), "Cancelled outstanding tasks");
            }
        }

        self.tracker.close();
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    "Shutdown grace elapsed with units still running"
                );
                false
            }
        }
    }
}

/// One spawned task execution.
struct TaskUnit {
    task_id: String,
    agent_id: String,
    plan: ExecutionPlan,
    reporter: Arc<dyn EventReporter>,
    handles: Arc<RwLock<HashMap<String, CancellationToken>>>,
    token: CancellationToken,
}

impl TaskUnit {
    async fn run(self) {
        self.emit(TaskStatus::Running, "started", 0).await;

        for i in 1..=self.plan.steps {
            tokio::select! {
                biased;

                _ = self.token.cancelled() => {
                    self.release().await;
                    info!(task_id = %self.task_id, completed = i - 1, "Task cancelled");
                    self.emit(TaskStatus::Cancelled, "cancelled", i - 1).await;
                    return;
                }
                _ = tokio::time::sleep(self.plan.step_interval) => {
                    self.emit(TaskStatus::Running, &format!("step-{i}"), i).await;
                }
            }
        }

        self.release().await;
        info!(task_id = %self.task_id, "Task finished");
        self.emit(TaskStatus::Finished, "done", self.plan.steps).await;
    }

    /// Drop this unit's handle. Runs before the terminal event so observers
    /// of that event see the task as no longer running.
    async fn release(&self) {
        self.handles.write().await.remove(&self.task_id);
        debug!(task_id = %self.task_id, "Handle released");
    }

    async fn emit(&self, status: TaskStatus, step: &str, progress: u32) {
        self.reporter
            .report(TaskEvent::new(
                &self.task_id,
                &self.agent_id,
                status,
                step,
                progress,
            ))
            .await;
    }
}
