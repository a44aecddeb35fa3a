//! taskmesh: orchestrates cancellable tasks across a pool of worker nodes.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod protocol;
pub mod task;
pub mod worker;
