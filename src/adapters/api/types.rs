//! Bot-trading API Wire Types
//!
//! Request and response bodies for the bot-trading namespace. Kept
//! separate from domain types so the wire contract can evolve without
//! touching the state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::{StatusView, TradeRequest};
use crate::domain::status::{FlowKind, RequestStatus};

/// Body for `POST /bot-trading/trades`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateTradeBody {
    /// Game (universe) ID the delivery happens in.
    pub game_id: String,
    /// Buyer's platform username (receives the friend request).
    pub buyer: String,
    /// Seller's platform username.
    pub seller: String,
    /// Marketplace listing being delivered.
    pub listing_id: String,
}

/// Body for `POST /bot-trading/custody`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateCustodyBody {
    /// Game (universe) ID the deposit happens in.
    pub game_id: String,
    /// Seller's platform username (receives the friend request).
    pub seller: String,
    /// Marketplace listing being deposited.
    pub listing_id: String,
}

/// Assigned bot details returned at initiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotBody {
    pub id: String,
    pub username: String,
}

/// Response for initiation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatedBody {
    pub id: Uuid,
    pub flow: FlowKind,
    pub status: RequestStatus,
    pub bot: BotBody,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl InitiatedBody {
    pub fn from_request(request: &TradeRequest, bot_username: String) -> Self {
        Self {
            id: request.id,
            flow: request.flow,
            status: request.status,
            bot: BotBody {
                id: request.bot_id.clone(),
                username: bot_username,
            },
            created_at: request.created_at,
            deadline: request.deadline,
        }
    }
}

/// Response for status endpoints, polled by storefront clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBody {
    pub id: Uuid,
    pub flow: FlowKind,
    pub status: RequestStatus,
    pub bot_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<StatusView> for StatusBody {
    fn from(view: StatusView) -> Self {
        Self {
            id: view.id,
            flow: view.flow,
            status: view.status,
            bot_id: view.bot_id,
            failure_reason: view.failure_reason,
            updated_at: view.updated_at,
        }
    }
}

impl From<StatusBody> for StatusView {
    fn from(body: StatusBody) -> Self {
        Self {
            id: body.id,
            flow: body.flow,
            status: body.status,
            bot_id: body.bot_id,
            failure_reason: body.failure_reason,
            updated_at: body.updated_at,
        }
    }
}

/// Error body: `{ "error": "<message>" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
