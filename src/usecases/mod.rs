//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the service's core workflows.
//!
//! Use cases:
//! - `Orchestrator`: request lifecycle ownership, confirmation watcher,
//!   expiry sweeper
//! - `StatusPoller`: client-side backoff polling mapped to UI steps

pub mod orchestrator;
pub mod poller;
