//! Orchestrator role: control surface and event ingestion.

pub mod routes;

pub use routes::{OrchestratorState, orchestrator_routes};
