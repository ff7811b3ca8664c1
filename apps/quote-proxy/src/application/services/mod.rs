//! Application Services
//!
//! Use-case services built on top of the port interfaces.

/// Windowed, deadline-bounded batch orchestration.
pub mod orchestrator;

pub use orchestrator::{BatchOrchestrator, OrchestratorSettings};
