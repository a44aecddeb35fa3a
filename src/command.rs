//! Command router: turns control commands into registry and dispatch actions.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::dispatch::WorkerDispatch;
use crate::error::CommandError;
use crate::task::{Task, TaskRegistry, TaskStatus, WorkerNode, select_worker};

/// A parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/run [agent=<id>] <prompt>`
    Run {
        agent: Option<String>,
        prompt: String,
    },
    /// `/status`
    Status,
    /// `/stop <taskId>`
    Stop { task_id: String },
}

impl Command {
    /// Parse command text. The command word must be the whole first token.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let text = text.trim();
        let (word, args) = match text.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (text, ""),
        };

        match word {
            "/run" => {
                let (agent, prompt) = match args.strip_prefix("agent=") {
                    Some(rest) => match rest.split_once(char::is_whitespace) {
                        Some((agent, prompt)) => (Some(agent.to_string()), prompt.trim()),
                        None => (Some(rest.to_string()), ""),
                    },
                    None => (None, args),
                };
                if prompt.is_empty() {
                    return Err(CommandError::MissingPrompt);
                }
                Ok(Self::Run {
                    agent: agent.filter(|a| !a.is_empty()),
                    prompt: prompt.to_string(),
                })
            }
            "/status" => Ok(Self::Status),
            "/stop" => {
                if args.is_empty() {
                    return Err(CommandError::MissingTaskId);
                }
                Ok(Self::Stop {
                    task_id: args.to_string(),
                })
            }
            _ => Err(CommandError::UnknownCommand),
        }
    }
}

/// Result of a successfully executed command.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommandOutcome {
    Dispatched(Task),
    Snapshot(Vec<Task>),
    StopRequested { ok: bool, task_id: String },
}

/// Routes commands to the registry, selector and dispatch client.
pub struct CommandRouter {
    registry: Arc<TaskRegistry>,
    roster: Vec<WorkerNode>,
    dispatch: Arc<dyn WorkerDispatch>,
}

impl CommandRouter {
    pub fn new(
        registry: Arc<TaskRegistry>,
        roster: Vec<WorkerNode>,
        dispatch: Arc<dyn WorkerDispatch>,
    ) -> Self {
        Self {
            registry,
            roster,
            dispatch,
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Execute a parsed command.
    pub async fn execute(&self, command: Command) -> Result<CommandOutcome, CommandError> {
        match command {
            Command::Run { agent, prompt } => self
                .run(agent.as_deref(), &prompt)
                .await
                .map(CommandOutcome::Dispatched),
            Command::Status => Ok(CommandOutcome::Snapshot(self.status().await)),
            Command::Stop { task_id } => {
                self.stop(&task_id).await?;
                Ok(CommandOutcome::StopRequested { ok: true, task_id })
            }
        }
    }

    /// Create a task and dispatch it to an explicit or least-loaded worker.
    ///
    /// A failed dispatch leaves the task in the registry with status `error`.
    pub async fn run(&self, agent: Option<&str>, prompt: &str) -> Result<Task, CommandError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(CommandError::MissingPrompt);
        }

        let worker = match agent {
            Some(id) => self
                .find_worker(id)
                .ok_or_else(|| CommandError::WorkerNotFound { id: id.to_string() })?,
            None => {
                let snapshot = self.registry.list_all().await;
                select_worker(&self.roster, &snapshot).ok_or(CommandError::NoWorkerAvailable)?
            }
        };

        let task = self
            .registry
            .create(Task::dispatched(&worker.id, prompt))
            .await?;

        if let Err(e) = self.dispatch.start(&worker, &task.id, prompt).await {
            warn!(task_id = %task.id, agent = %worker.id, error = %e, "Dispatch failed");
            // Keep the failed attempt visible to operators.
            if let Err(re) = self
                .registry
                .upsert_status(&task.id, &worker.id, TaskStatus::Error, &e.to_string(), 0)
                .await
            {
                warn!(task_id = %task.id, error = %re, "Could not record dispatch failure");
            }
            return Err(e.into());
        }

        info!(
            task_id = %task.id,
            agent = %worker.id,
            status = %task.status,
            step = %task.step,
            "Task dispatched"
        );
        Ok(task)
    }

    /// Snapshot of every known task.
    pub async fn status(&self) -> Vec<Task> {
        self.registry.list_all().await
    }

    /// Ask the task's worker to cancel it.
    ///
    /// Does not touch the registry; the terminal transition arrives later as
    /// an event from the worker.
    pub async fn stop(&self, task_id: &str) -> Result<(), CommandError> {
        let task = self
            .registry
            .get(task_id)
            .await
            .ok_or_else(|| CommandError::TaskNotFound {
                id: task_id.to_string(),
            })?;

        let worker = self
            .find_worker(&task.agent_id)
            .ok_or_else(|| CommandError::WorkerNotFound {
                id: task.agent_id.clone(),
            })?;

        self.dispatch.cancel(&worker, task_id).await?;

        info!(task_id = %task_id, agent = %worker.id, "Cancel requested");
        Ok(())
    }

    fn find_worker(&self, id: &str) -> Option<WorkerNode> {
        self.roster.iter().find(|w| w.id == id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::DispatchError;

    /// Records every call; optionally fails them all.
    #[derive(Default)]
    struct StubDispatch {
        fail: bool,
        calls: Mutex<Vec<(String, String, String)>>,
    }

    impl StubDispatch {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn record(
            &self,
            kind: &str,
            worker: &WorkerNode,
            task_id: &str,
        ) -> Result<(), DispatchError> {
            self.calls.lock().unwrap().push((
                kind.to_string(),
                worker.id.clone(),
                task_id.to_string(),
            ));
            if self.fail {
                return Err(DispatchError::Transport {
                    url: format!("{}/{kind}", worker.addr),
                    reason: "connection refused".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl WorkerDispatch for StubDispatch {
        async fn start(
            &self,
            worker: &WorkerNode,
            task_id: &str,
            _prompt: &str,
        ) -> Result<(), DispatchError> {
            self.record("run", worker, task_id)
        }

        async fn cancel(&self, worker: &WorkerNode, task_id: &str) -> Result<(), DispatchError> {
            self.record("cancel", worker, task_id)
        }
    }

    fn roster() -> Vec<WorkerNode> {
        vec![
            WorkerNode::new("macmini", "http://macmini:8080"),
            WorkerNode::new("laptop", "http://laptop:8080"),
        ]
    }

    fn router(dispatch: Arc<StubDispatch>) -> CommandRouter {
        CommandRouter::new(Arc::new(TaskRegistry::new()), roster(), dispatch)
    }

    #[test]
    fn parse_run_variants() {
        assert_eq!(
            Command::parse("/run build the thing").unwrap(),
            Command::Run {
                agent: None,
                prompt: "build the thing".into()
            }
        );
        assert_eq!(
            Command::parse("  /run agent=laptop  summarize logs ").unwrap(),
            Command::Run {
                agent: Some("laptop".into()),
                prompt: "summarize logs".into()
            }
        );
        assert!(matches!(
            Command::parse("/run agent=laptop"),
            Err(CommandError::MissingPrompt)
        ));
        assert!(matches!(
            Command::parse("/run   "),
            Err(CommandError::MissingPrompt)
        ));
    }

    #[test]
    fn parse_status_stop_and_unknown() {
        assert_eq!(Command::parse("/status").unwrap(), Command::Status);
        assert_eq!(
            Command::parse("/stop task-1").unwrap(),
            Command::Stop {
                task_id: "task-1".into()
            }
        );
        assert!(matches!(
            Command::parse("/stop"),
            Err(CommandError::MissingTaskId)
        ));
        assert!(matches!(
            Command::parse("/running now"),
            Err(CommandError::UnknownCommand)
        ));
        assert!(matches!(
            Command::parse("hello"),
            Err(CommandError::UnknownCommand)
        ));
    }

    #[tokio::test]
    async fn run_then_status_round_trip() {
        let dispatch = Arc::new(StubDispatch::default());
        let router = router(Arc::clone(&dispatch));

        let task = router.run(None, "hello").await.unwrap();
        let snapshot = router.status().await;

        let matching: Vec<&Task> = snapshot.iter().filter(|t| t.id == task.id).collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].status, TaskStatus::Pending);
        assert_eq!(matching[0].progress, 0);
        assert_eq!(matching[0].step, "dispatched");

        let calls = dispatch.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "run");
        assert_eq!(calls[0].2, task.id);
    }

    #[tokio::test]
    async fn run_with_explicit_agent() {
        let dispatch = Arc::new(StubDispatch::default());
        let router = router(Arc::clone(&dispatch));

        let task = router.run(Some("laptop"), "hello").await.unwrap();
        assert_eq!(task.agent_id, "laptop");
    }

    #[tokio::test]
    async fn run_spreads_load_across_workers() {
        let router = router(Arc::new(StubDispatch::default()));

        let first = router.run(None, "one").await.unwrap();
        let second = router.run(None, "two").await.unwrap();
        assert_ne!(first.agent_id, second.agent_id);
    }

    #[tokio::test]
    async fn run_unknown_agent_is_worker_not_found() {
        let router = router(Arc::new(StubDispatch::default()));
        let err = router.run(Some("ghost"), "hello").await.unwrap_err();
        assert!(matches!(err, CommandError::WorkerNotFound { id } if id == "ghost"));
        assert!(router.registry().is_empty().await);
    }

    #[tokio::test]
    async fn run_empty_roster_is_no_worker_available() {
        let router = CommandRouter::new(
            Arc::new(TaskRegistry::new()),
            Vec::new(),
            Arc::new(StubDispatch::default()),
        );
        let err = router.run(None, "hello").await.unwrap_err();
        assert!(matches!(err, CommandError::NoWorkerAvailable));
    }

    #[tokio::test]
    async fn run_blank_prompt_is_rejected_before_state_change() {
        let router = router(Arc::new(StubDispatch::default()));
        let err = router.run(None, "   ").await.unwrap_err();
        assert!(matches!(err, CommandError::MissingPrompt));
        assert!(router.registry().is_empty().await);
    }

    #[tokio::test]
    async fn failed_dispatch_is_recorded_and_returned() {
        let router = router(Arc::new(StubDispatch::failing()));

        let err = router.run(Some("macmini"), "hello").await.unwrap_err();
        assert!(matches!(err, CommandError::Dispatch(_)));

        let snapshot = router.status().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status, TaskStatus::Error);
        assert!(snapshot[0].step.contains("connection refused"));
    }

    #[tokio::test]
    async fn stop_unknown_task_is_task_not_found() {
        let router = router(Arc::new(StubDispatch::default()));
        let err = router.stop("task-never").await.unwrap_err();
        assert!(matches!(err, CommandError::TaskNotFound { .. }));
    }

    #[tokio::test]
    async fn stop_sends_cancel_without_mutating_state() {
        let dispatch = Arc::new(StubDispatch::default());
        let router = router(Arc::clone(&dispatch));
        let task = router.run(Some("macmini"), "hello").await.unwrap();

        router.stop(&task.id).await.unwrap();

        let calls = dispatch.calls.lock().unwrap();
        assert_eq!(calls.last().unwrap().0, "cancel");
        assert_eq!(calls.last().unwrap().1, "macmini");
        drop(calls);
        assert_eq!(
            router.registry().get(&task.id).await.unwrap().status,
            TaskStatus::Pending
        );
    }

    #[tokio::test]
    async fn stop_task_on_unknown_worker() {
        let router = router(Arc::new(StubDispatch::default()));
        router
            .registry()
            .upsert_status("task-ext", "retired", TaskStatus::Running, "step-1", 1)
            .await
            .unwrap();

        let err = router.stop("task-ext").await.unwrap_err();
        assert!(matches!(err, CommandError::WorkerNotFound { id } if id == "retired"));
    }

    #[tokio::test]
    async fn failed_cancel_leaves_state_alone() {
        let router = router(Arc::new(StubDispatch::failing()));
        router
            .registry()
            .upsert_status("t1", "laptop", TaskStatus::Running, "step-2", 2)
            .await
            .unwrap();

        let err = router.stop("t1").await.unwrap_err();
        assert!(matches!(err, CommandError::Dispatch(_)));
        let task = router.registry().get("t1").await.unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.progress, 2);
    }

    #[tokio::test]
    async fn execute_status_returns_snapshot() {
        let router = router(Arc::new(StubDispatch::default()));
        router.run(None, "hello").await.unwrap();
        match router.execute(Command::Status).await.unwrap() {
            CommandOutcome::Snapshot(tasks) => assert_eq!(tasks.len(), 1),
            other => panic!("expected snapshot, got {other:?}"),
        }
    }
}
