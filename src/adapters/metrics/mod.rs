//! Metrics Adapters - Health Checks and Prometheus Export
//!
//! Two small HTTP surfaces: the health server (/live, /ready) for
//! container probes, and the Prometheus registry served at /metrics.

pub mod health;
pub mod prometheus;

pub use health::{HealthServer, HealthState};
pub use prometheus::MetricsRegistry;
