//! REST endpoints for the orchestrator control surface.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::command::{Command, CommandRouter};
use crate::error::RegistryError;
use crate::protocol::{CommandRequest, TaskEvent};
use crate::task::TaskRegistry;

/// Shared state for orchestrator routes.
#[derive(Clone)]
pub struct OrchestratorState {
    pub router: Arc<CommandRouter>,
}

impl OrchestratorState {
    pub fn new(router: CommandRouter) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    fn registry(&self) -> &Arc<TaskRegistry> {
        self.router.registry()
    }
}

/// Build the orchestrator router.
pub fn orchestrator_routes(state: OrchestratorState) -> Router {
    Router::new()
        .route("/command", post(post_command))
        .route("/event", post(post_event))
        .route("/tasks", get(list_tasks))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.to_string() })),
    )
        .into_response()
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "taskmesh-orchestrator"
    }))
}

// ── Commands ────────────────────────────────────────────────────────────

/// POST /command
///
/// Accepts `/run [agent=<id>] <prompt>`, `/status` and `/stop <taskId>`.
async fn post_command(
    State(state): State<OrchestratorState>,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let result = match Command::parse(&req.text) {
        Ok(command) => state.router.execute(command).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            warn!(text = %req.text, error = %e, "Command failed");
            error_response(e.status_code(), e)
        }
    }
}

// ── Events ──────────────────────────────────────────────────────────────

/// POST /event
///
/// Ingests a worker status event. Events for terminal tasks, and events that
/// would move a task backwards, are dropped and reported as `applied: false`.
async fn post_event(
    State(state): State<OrchestratorState>,
    body: Result<Json<TaskEvent>, JsonRejection>,
) -> Response {
    let Json(event) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let applied = match state
        .registry()
        .upsert_status(
            &event.task_id,
            &event.agent_id,
            event.status,
            &event.step,
            event.progress,
        )
        .await
    {
        Ok(_) => {
            info!(
                agent = %event.agent_id,
                task_id = %event.task_id,
                status = %event.status,
                step = %event.step,
                "Task event"
            );
            true
        }
        Err(e @ RegistryError::AlreadyTerminal { .. }) => {
            warn!(agent = %event.agent_id, error = %e, "Ignoring late event");
            false
        }
        Err(e) => {
            warn!(agent = %event.agent_id, error = %e, "Ignoring out-of-order event");
            false
        }
    };

    Json(serde_json::json!({ "ok": true, "applied": applied })).into_response()
}

// ── Tasks ───────────────────────────────────────────────────────────────

/// GET /tasks
async fn list_tasks(State(state): State<OrchestratorState>) -> impl IntoResponse {
    Json(state.registry().list_all().await)
}
