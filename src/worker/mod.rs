//! Worker role: task execution and event reporting.
//!
//! Core components:
//! - `executor`: spawned, cancellable multi-step task units
//! - `reporter`: best-effort event push to the orchestrator
//! - `routes`: `/run`, `/cancel`, `/health`

pub mod executor;
pub mod reporter;
pub mod routes;

pub use executor::{ExecutionPlan, Executor};
pub use reporter::{EventReporter, HttpEventReporter};
pub use routes::{WorkerState, worker_routes};
