//! Social Platform Port - External Gaming Platform Interface
//!
//! The platform's user/avatar/friendship APIs are a black-box
//! collaborator: given a username they return a user ID, avatar, or
//! friendship status, and they may fail or rate-limit. The friendship
//! status lookup is the authoritative confirmation source for the
//! `FriendAccepted` transition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Friendship state between a bot account and a counterparty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FriendshipState {
    /// No relationship on record.
    NotFriends,
    /// A friend request is outstanding.
    RequestSent,
    /// The counterparty accepted.
    Friends,
}

/// A resolved platform account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformUser {
    /// Numeric platform user ID.
    pub user_id: u64,
    /// Canonical username.
    pub username: String,
    /// Display name, when the platform exposes one.
    pub display_name: Option<String>,
}

/// Trait for the external social-gaming platform.
#[async_trait]
pub trait SocialPlatform: Send + Sync + 'static {
    /// Resolve a username to a platform account.
    async fn resolve_user(&self, username: &str) -> anyhow::Result<PlatformUser>;

    /// Fetch the avatar thumbnail URL for a user.
    async fn avatar_url(&self, user_id: u64) -> anyhow::Result<String>;

    /// Query the friendship state between a bot and a counterparty.
    async fn friendship_state(
        &self,
        bot_user_id: u64,
        user_id: u64,
    ) -> anyhow::Result<FriendshipState>;

    /// Dispatch a friend request from a bot to a counterparty.
    async fn send_friend_request(
        &self,
        bot_user_id: u64,
        user_id: u64,
    ) -> anyhow::Result<()>;

    /// Check if the platform is reachable.
    async fn is_healthy(&self) -> bool;
}
