//! Task tracking on the orchestrator.
//!
//! - `model`: Task record and lifecycle state machine
//! - `registry`: lock-guarded store of every known task
//! - `selector`: least-loaded worker selection

pub mod model;
pub mod registry;
pub mod selector;

pub use model::{Task, TaskStatus, WorkerNode};
pub use registry::TaskRegistry;
pub use selector::{active_load, select_worker};
