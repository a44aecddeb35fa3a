//! Dispatch client: tells a worker to start or cancel a task.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::DispatchError;
use crate::protocol::{CancelRequest, RunRequest};
use crate::task::WorkerNode;

/// Outbound start/cancel instructions to a worker node.
///
/// One attempt per call; retrying is left to the operator.
#[async_trait]
pub trait WorkerDispatch: Send + Sync {
    async fn start(
        &self,
        worker: &WorkerNode,
        task_id: &str,
        prompt: &str,
    ) -> Result<(), DispatchError>;

    async fn cancel(&self, worker: &WorkerNode, task_id: &str) -> Result<(), DispatchError>;
}

/// HTTP implementation backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct HttpDispatch {
    client: reqwest::Client,
}

impl HttpDispatch {
    /// Every start/cancel call is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn post<T: Serialize + Sync>(&self, url: String, body: &T) -> Result<(), DispatchError> {
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| DispatchError::Transport {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        // Drain the body so the connection can be reused.
        let _ = resp.bytes().await;

        if status.is_client_error() || status.is_server_error() {
            return Err(DispatchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        debug!(url = %url, status = status.as_u16(), "Dispatch accepted");
        Ok(())
    }
}

#[async_trait]
impl WorkerDispatch for HttpDispatch {
    async fn start(
        &self,
        worker: &WorkerNode,
        task_id: &str,
        prompt: &str,
    ) -> Result<(), DispatchError> {
        let body = RunRequest {
            task_id: task_id.to_string(),
            prompt: prompt.to_string(),
        };
        self.post(format!("{}/run", worker.addr), &body).await
    }

    async fn cancel(&self, worker: &WorkerNode, task_id: &str) -> Result<(), DispatchError> {
        let body = CancelRequest {
            task_id: task_id.to_string(),
        };
        self.post(format!("{}/cancel", worker.addr), &body).await
    }
}
