//! Request entity and status views.
//!
//! `TradeRequest` is the single entity both flows share; `FlowKind` decides
//! which tail of the state machine applies. Every mutation goes through
//! `advance`/`fail` so the transition rules in `domain::status` cannot be
//! bypassed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::{FlowKind, RequestStatus};

/// Rejected status change. Carries enough context for a 409 body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal {flow} transition: {from} -> {to}")]
pub struct TransitionError {
    pub flow: FlowKind,
    pub from: RequestStatus,
    pub to: RequestStatus,
}

/// A trade or custody request, journaled on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    /// Request ID, assigned at initiation.
    pub id: Uuid,
    /// Which lifecycle this request follows.
    pub flow: FlowKind,
    /// External game (universe) ID the bot operates in.
    pub game_id: String,
    /// Buying party's platform username. Absent for custody deposits.
    pub buyer: Option<String>,
    /// Selling party's platform username.
    pub seller: String,
    /// Marketplace listing (pet) this request is about.
    pub listing_id: String,
    /// Assigned bot from the registry.
    pub bot_id: String,
    /// Current lifecycle status.
    pub status: RequestStatus,
    /// Why the request failed, when it did.
    pub failure_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Set when the flow reaches its terminal success status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Friendship must be confirmed by this instant or the request fails.
    pub deadline: DateTime<Utc>,
}

impl TradeRequest {
    /// Create a `Pending` trade request with a confirmation deadline.
    pub fn new_trade(
        game_id: impl Into<String>,
        buyer: impl Into<String>,
        seller: impl Into<String>,
        listing_id: impl Into<String>,
        bot_id: impl Into<String>,
        confirmation_ttl: Duration,
    ) -> Self {
        Self::new(
            FlowKind::Trade,
            game_id.into(),
            Some(buyer.into()),
            seller.into(),
            listing_id.into(),
            bot_id.into(),
            confirmation_ttl,
        )
    }

    /// Create a `Pending` custody request with a confirmation deadline.
    pub fn new_custody(
        game_id: impl Into<String>,
        seller: impl Into<String>,
        listing_id: impl Into<String>,
        bot_id: impl Into<String>,
        confirmation_ttl: Duration,
    ) -> Self {
        Self::new(
            FlowKind::Custody,
            game_id.into(),
            None,
            seller.into(),
            listing_id.into(),
            bot_id.into(),
            confirmation_ttl,
        )
    }

    fn new(
        flow: FlowKind,
        game_id: String,
        buyer: Option<String>,
        seller: String,
        listing_id: String,
        bot_id: String,
        confirmation_ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            flow,
            game_id,
            buyer,
            seller,
            listing_id,
            bot_id,
            status: RequestStatus::Pending,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            deadline: now + confirmation_ttl,
        }
    }

    /// The party the bot must befriend: the buyer for deliveries, the
    /// seller for custody deposits.
    pub fn counterparty(&self) -> &str {
        self.buyer.as_deref().unwrap_or(&self.seller)
    }

    /// Move to the next status, enforcing the flow's transition table.
    pub fn advance(&mut self, to: RequestStatus) -> Result<(), TransitionError> {
        if !self.flow.is_legal(self.status, to) {
            return Err(TransitionError {
                flow: self.flow,
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        if to.is_terminal() && to != RequestStatus::Failed {
            self.completed_at = Some(self.updated_at);
        }
        Ok(())
    }

    /// Mark the request failed with a reason.
    ///
    /// Returns `false` when the request is already terminal, so concurrent
    /// failure paths (watcher vs. sweeper) collapse to a single transition.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = RequestStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.updated_at = Utc::now();
        true
    }

    /// Whether the request still holds its bot slot.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// The confirmation deadline only binds until the friendship is
    /// accepted; later stages are driven by explicit notifications.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_active()
            && self.status.rank() < RequestStatus::FriendAccepted.rank()
            && now >= self.deadline
    }

    /// Snapshot for polling clients.
    pub fn view(&self) -> StatusView {
        StatusView {
            id: self.id,
            flow: self.flow,
            status: self.status,
            bot_id: self.bot_id.clone(),
            failure_reason: self.failure_reason.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// What a polling client sees: the status plus just enough context to
/// render a progress step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusView {
    pub id: Uuid,
    pub flow: FlowKind,
    pub status: RequestStatus,
    pub bot_id: String,
    pub failure_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade() -> TradeRequest {
        TradeRequest::new_trade("8737899170", "buyer1", "seller1", "lst_1", "bot-a", Duration::minutes(10))
    }

    #[test]
    fn test_new_trade_starts_pending() {
        let req = trade();
        assert_eq!(req.status, RequestStatus::Pending);
        assert_eq!(req.counterparty(), "buyer1");
        assert!(req.completed_at.is_none());
        assert!(req.deadline > req.created_at);
    }

    #[test]
    fn test_custody_counterparty_is_seller() {
        let req = TradeRequest::new_custody("8737899170", "seller1", "lst_1", "bot-a", Duration::minutes(10));
        assert_eq!(req.counterparty(), "seller1");
    }

    #[test]
    fn test_advance_walks_happy_path() {
        let mut req = trade();
        for status in FlowKind::Trade.happy_path().iter().skip(1) {
            req.advance(*status).unwrap();
        }
        assert_eq!(req.status, RequestStatus::Completed);
        assert!(req.completed_at.is_some());
    }

    #[test]
    fn test_advance_rejects_skip() {
        let mut req = trade();
        let err = req.advance(RequestStatus::Trading).unwrap_err();
        assert_eq!(err.from, RequestStatus::Pending);
        assert_eq!(err.to, RequestStatus::Trading);
        assert_eq!(req.status, RequestStatus::Pending);
    }

    #[test]
    fn test_fail_is_exactly_once() {
        let mut req = trade();
        assert!(req.fail("confirmation timeout"));
        assert!(!req.fail("second failure"));
        assert_eq!(req.failure_reason.as_deref(), Some("confirmation timeout"));
        assert_eq!(req.status, RequestStatus::Failed);
    }

    #[test]
    fn test_expiry_only_before_acceptance() {
        let mut req = trade();
        let past = req.deadline + Duration::seconds(1);
        assert!(req.is_expired(past));

        req.advance(RequestStatus::FriendRequestSent).unwrap();
        assert!(req.is_expired(past));

        req.advance(RequestStatus::FriendAccepted).unwrap();
        assert!(!req.is_expired(past));
    }
}
