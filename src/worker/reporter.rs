//! Event reporter: best-effort push of task events to the orchestrator.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::protocol::TaskEvent;

/// One-way sink for task events.
///
/// Delivery is at-most-once: implementations swallow failures and never
/// retry. Events carry no sequence number, so a lost report leaves the
/// orchestrator's view stale until the next event for that task.
#[async_trait]
pub trait EventReporter: Send + Sync {
    async fn report(&self, event: TaskEvent);
}

/// Posts events to `{orchestrator}/event`.
pub struct HttpEventReporter {
    client: reqwest::Client,
    url: String,
}

impl HttpEventReporter {
    pub fn new(orchestrator_addr: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/event", orchestrator_addr.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventReporter for HttpEventReporter {
    async fn report(&self, event: TaskEvent) {
        match self.client.post(&self.url).json(&event).send().await {
            Ok(resp) if !resp.status().is_success() => {
                warn!(
                    task_id = %event.task_id,
                    status = resp.status().as_u16(),
                    "Orchestrator rejected event, dropping"
                );
            }
            Ok(_) => {
                debug!(task_id = %event.task_id, step = %event.step, "Event delivered");
            }
            Err(e) => {
                warn!(task_id = %event.task_id, error = %e, "Event delivery failed, dropping");
            }
        }
    }
}
