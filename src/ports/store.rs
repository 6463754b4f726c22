//! Request Store Port - Durable Keyed Request Storage
//!
//! Replaces the original process-local request map with a durable store
//! keyed by request ID. Every mutation is journaled before it is
//! acknowledged, so a restart recovers all in-flight requests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::request::TradeRequest;

/// Trait for durable request storage.
///
/// Implementations journal in JSONL (one self-contained record per line)
/// and keep an in-memory index for reads.
#[async_trait]
pub trait RequestStore: Send + Sync + 'static {
    /// Persist a newly created request. Errors on a duplicate ID.
    async fn insert(&self, request: &TradeRequest) -> anyhow::Result<()>;

    /// Persist a mutated request. Errors when the ID is unknown.
    async fn update(&self, request: &TradeRequest) -> anyhow::Result<()>;

    /// Fetch a request by ID.
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<TradeRequest>>;

    /// All non-terminal requests, oldest first.
    async fn list_active(&self) -> anyhow::Result<Vec<TradeRequest>>;

    /// Check if the store is healthy (disk space, permissions).
    async fn is_healthy(&self) -> bool;
}
