//! Configuration types, built from environment variables.

use std::time::Duration;

use crate::error::ConfigError;
use crate::task::WorkerNode;
use crate::worker::ExecutionPlan;

/// Roster used when `TASKMESH_WORKERS` is unset.
pub const DEFAULT_ROSTER: &str =
    "macmini=http://macmini.local:8080,laptop=http://laptop.local:8080";

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub listen: String,
    pub workers: Vec<WorkerNode>,
    /// Timeout for each outbound start/cancel call.
    pub dispatch_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9000".to_string(),
            workers: parse_roster(DEFAULT_ROSTER).unwrap_or_default(),
            dispatch_timeout: Duration::from_secs(10),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let listen = var("TASKMESH_LISTEN").unwrap_or(defaults.listen);

        let workers = match var("TASKMESH_WORKERS") {
            Some(raw) => parse_roster(&raw)?,
            None => defaults.workers,
        };

        let dispatch_timeout = Duration::from_secs(parse_var(
            &var,
            "TASKMESH_DISPATCH_TIMEOUT_SECS",
            defaults.dispatch_timeout.as_secs(),
        )?);

        Ok(Self {
            listen,
            workers,
            dispatch_timeout,
        })
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub listen: String,
    /// Identity reported in every event.
    pub agent_id: String,
    pub orchestrator_addr: String,
    pub plan: ExecutionPlan,
    /// Timeout for each event delivery.
    pub report_timeout: Duration,
    /// How long shutdown waits for cancelled units to report.
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            agent_id: "worker-1".to_string(),
            orchestrator_addr: "http://127.0.0.1:9000".to_string(),
            plan: ExecutionPlan::default(),
            report_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let listen = var("TASKMESH_LISTEN").unwrap_or(defaults.listen);
        let agent_id = var("WORKER_ID")
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.agent_id);
        let orchestrator_addr = var("ORCHESTRATOR_ADDR")
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.orchestrator_addr);

        let steps = parse_var(&var, "TASKMESH_STEPS", defaults.plan.steps)?;
        let interval_ms = parse_var(
            &var,
            "TASKMESH_STEP_INTERVAL_MS",
            defaults.plan.step_interval.as_millis() as u64,
        )?;

        Ok(Self {
            listen,
            agent_id,
            orchestrator_addr,
            plan: ExecutionPlan {
                steps,
                step_interval: Duration::from_millis(interval_ms),
            },
            report_timeout: defaults.report_timeout,
            shutdown_grace: defaults.shutdown_grace,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a roster of the form `id=addr,id=addr`.
///
/// Trailing slashes are stripped from addresses; ids must be unique.
pub fn parse_roster(raw: &str) -> Result<Vec<WorkerNode>, ConfigError> {
    let mut workers: Vec<WorkerNode> = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (id, addr) = entry
            .split_once('=')
            .map(|(id, addr)| (id.trim(), addr.trim().trim_end_matches('/')))
            .filter(|(id, addr)| !id.is_empty() && !addr.is_empty())
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "TASKMESH_WORKERS".to_string(),
                message: format!("expected id=addr, got {entry:?}"),
            })?;

        if workers.iter().any(|w| w.id == id) {
            return Err(ConfigError::InvalidValue {
                key: "TASKMESH_WORKERS".to_string(),
                message: format!("duplicate worker id {id:?}"),
            });
        }
        workers.push(WorkerNode::new(id, addr));
    }

    Ok(workers)
}
