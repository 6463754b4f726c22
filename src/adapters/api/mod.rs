//! Bot-trading API Adapter - HTTP Surface of the Orchestrator
//!
//! The axum router serving the bot-trading namespace, the wire types,
//! and the reqwest-based `StatusClient` for out-of-process pollers.

pub mod client;
pub mod routes;
pub mod types;

pub use client::StatusClient;
