//! Request lifecycle state machine.
//!
//! Defines the two flow kinds, the status set shared by both, and the
//! transition table that enforces exactly-once ordered progress. A request
//! may only move to its flow's direct successor, or to `Failed` from any
//! non-terminal status. Terminal statuses accept no further transitions.

use serde::{Deserialize, Serialize};

/// Which lifecycle a request follows.
///
/// Trade: buyer purchase delivered in-game by a bot.
/// Custody: seller deposit of a pet into a bot account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Trade,
    Custody,
}

impl std::fmt::Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trade => write!(f, "trade"),
            Self::Custody => write!(f, "custody"),
        }
    }
}

/// Lifecycle status of a trade or custody request.
///
/// Wire representation is the snake_case string (`friend_request_sent`, …),
/// which is what polling clients match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Created, bot assigned, friend request not yet dispatched.
    Pending,
    /// Friend request dispatched on the platform.
    FriendRequestSent,
    /// Platform confirmed the friendship (authoritative poll result).
    FriendAccepted,
    /// Both parties in-game, trade window open (trade flow only).
    Trading,
    /// Trade executed and delivered (trade flow terminal).
    Completed,
    /// Bot received the deposited pet (custody flow only).
    PetReceived,
    /// Pet secured in bot custody (custody flow terminal).
    CustodyComplete,
    /// Absorbing failure state, reachable from any non-terminal status.
    Failed,
}

impl RequestStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::CustodyComplete | Self::Failed)
    }

    /// Position along the happy path. `Failed` ranks above everything so
    /// that status rank is non-decreasing over a request's whole life.
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::FriendRequestSent => 1,
            Self::FriendAccepted => 2,
            Self::Trading | Self::PetReceived => 3,
            Self::Completed | Self::CustodyComplete => 4,
            Self::Failed => 5,
        }
    }

    /// Wire string, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::FriendRequestSent => "friend_request_sent",
            Self::FriendAccepted => "friend_accepted",
            Self::Trading => "trading",
            Self::Completed => "completed",
            Self::PetReceived => "pet_received",
            Self::CustodyComplete => "custody_complete",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FlowKind {
    /// The happy-path sequence for this flow, in order.
    pub fn happy_path(self) -> &'static [RequestStatus] {
        use RequestStatus::*;
        match self {
            Self::Trade => &[Pending, FriendRequestSent, FriendAccepted, Trading, Completed],
            Self::Custody => &[
                Pending,
                FriendRequestSent,
                FriendAccepted,
                PetReceived,
                CustodyComplete,
            ],
        }
    }

    /// Direct successor of `status` on this flow's happy path, if any.
    pub fn successor(self, status: RequestStatus) -> Option<RequestStatus> {
        let path = self.happy_path();
        path.iter()
            .position(|s| *s == status)
            .and_then(|i| path.get(i + 1))
            .copied()
    }

    /// Whether a transition is legal under this flow's rules.
    ///
    /// Legal moves are the direct successor, or `Failed` from any
    /// non-terminal status. Skips and repeats are rejected.
    pub fn is_legal(self, from: RequestStatus, to: RequestStatus) -> bool {
        if from.is_terminal() {
            return false;
        }
        if to == RequestStatus::Failed {
            return true;
        }
        self.successor(from) == Some(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequestStatus::*;

    #[test]
    fn test_trade_happy_path_chains() {
        assert_eq!(FlowKind::Trade.successor(Pending), Some(FriendRequestSent));
        assert_eq!(FlowKind::Trade.successor(FriendRequestSent), Some(FriendAccepted));
        assert_eq!(FlowKind::Trade.successor(FriendAccepted), Some(Trading));
        assert_eq!(FlowKind::Trade.successor(Trading), Some(Completed));
        assert_eq!(FlowKind::Trade.successor(Completed), None);
    }

    #[test]
    fn test_custody_happy_path_chains() {
        assert_eq!(FlowKind::Custody.successor(FriendAccepted), Some(PetReceived));
        assert_eq!(FlowKind::Custody.successor(PetReceived), Some(CustodyComplete));
        assert_eq!(FlowKind::Custody.successor(CustodyComplete), None);
    }

    #[test]
    fn test_skip_rejected() {
        assert!(!FlowKind::Trade.is_legal(Pending, FriendAccepted));
        assert!(!FlowKind::Trade.is_legal(Pending, Completed));
        assert!(!FlowKind::Custody.is_legal(FriendRequestSent, PetReceived));
    }

    #[test]
    fn test_cross_flow_tail_rejected() {
        assert!(!FlowKind::Trade.is_legal(FriendAccepted, PetReceived));
        assert!(!FlowKind::Custody.is_legal(FriendAccepted, Trading));
    }

    #[test]
    fn test_failed_reachable_from_non_terminal_only() {
        assert!(FlowKind::Trade.is_legal(Pending, Failed));
        assert!(FlowKind::Trade.is_legal(Trading, Failed));
        assert!(!FlowKind::Trade.is_legal(Completed, Failed));
        assert!(!FlowKind::Trade.is_legal(Failed, Failed));
    }

    #[test]
    fn test_wire_strings() {
        assert_eq!(FriendRequestSent.as_str(), "friend_request_sent");
        assert_eq!(CustodyComplete.as_str(), "custody_complete");
        let json = serde_json::to_string(&PetReceived).unwrap();
        assert_eq!(json, "\"pet_received\"");
    }
}
