//! Status Fetch Port - Client-side Status Lookup
//!
//! What the storefront poller needs from the orchestrator: a status view
//! by request ID. Implemented over HTTP by `adapters::api::StatusClient`
//! and directly by test doubles.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::request::StatusView;
use crate::domain::status::FlowKind;

/// Trait for fetching the current status of a request.
#[async_trait]
pub trait StatusFetch: Send + Sync + 'static {
    /// Fetch the status view for a request in the given flow namespace.
    async fn fetch(&self, flow: FlowKind, id: Uuid) -> anyhow::Result<StatusView>;
}
