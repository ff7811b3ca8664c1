//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the batch orchestration service and the port
//! interfaces it drives. Infrastructure adapters implement the ports.

/// Port interfaces for the upstream session and data fetch.
pub mod ports;

/// Application services for batch orchestration.
pub mod services;
