//! REST endpoints for the worker control surface.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::executor::Executor;
use crate::protocol::{CancelRequest, RunRequest};

/// Shared state for worker routes.
#[derive(Clone)]
pub struct WorkerState {
    pub executor: Arc<Executor>,
}

/// Build the worker router.
pub fn worker_routes(state: WorkerState) -> Router {
    Router::new()
        .route("/run", post(run_task))
        .route("/cancel", post(cancel_task))
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

fn ok() -> Response {
    Json(serde_json::json!({ "ok": true })).into_response()
}

async fn health() -> &'static str {
    "ok"
}

/// POST /run
///
/// Schedules the task and returns without waiting for it.
async fn run_task(
    State(state): State<WorkerState>,
    body: Result<Json<RunRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    if req.task_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "missing task_id");
    }

    match state.executor.start(&req.task_id, &req.prompt).await {
        Ok(()) => ok(),
        Err(e) => {
            warn!(task_id = %req.task_id, error = %e, "Run rejected");
            error_response(e.status_code(), e)
        }
    }
}

/// POST /cancel
async fn cancel_task(
    State(state): State<WorkerState>,
    body: Result<Json<CancelRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    if req.task_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "missing task_id");
    }

    match state.executor.cancel(&req.task_id).await {
        Ok(()) => ok(),
        Err(e) => error_response(e.status_code(), "task not running"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::protocol::TaskEvent;
    use crate::worker::executor::ExecutionPlan;
    use crate::worker::reporter::EventReporter;

    struct NullReporter;

    #[async_trait]
    impl EventReporter for NullReporter {
        async fn report(&self, _event: TaskEvent) {}
    }

    fn app() -> Router {
        let plan = ExecutionPlan {
            steps: 5,
            step_interval: Duration::from_secs(60),
        };
        let executor = Arc::new(Executor::new("w1", plan, Arc::new(NullReporter)));
        worker_routes(WorkerState { executor })
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn health_is_plain_ok() {
        let resp = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn run_without_task_id_is_bad_request() {
        let (status, body) = post_json(&app(), "/run", serde_json::json!({"prompt": "x"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing task_id");
    }

    #[tokio::test]
    async fn double_run_conflicts_and_cancel_is_once() {
        let app = app();
        let run = serde_json::json!({"task_id": "t1", "prompt": "x"});
        let (status, _) = post_json(&app, "/run", run.clone()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post_json(&app, "/run", run).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let cancel = serde_json::json!({"task_id": "t1"});
        let (status, _) = post_json(&app, "/cancel", cancel.clone()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = post_json(&app, "/cancel", cancel).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "task not running");
    }

    #[tokio::test]
    async fn cancel_unknown_is_not_found() {
        let cancel = serde_json::json!({"task_id": "nope"});
        let (status, body) = post_json(&app(), "/cancel", cancel).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "task not running");
    }
}
