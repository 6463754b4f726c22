//! Wire types for the platform's public and semi-public APIs.
//!
//! Only the fields the orchestrator reads are modeled; everything else
//! the platform returns is ignored by serde.

use serde::{Deserialize, Serialize};

/// Body for the username resolution endpoint.
#[derive(Debug, Serialize)]
pub struct UsernameLookupRequest {
    pub usernames: Vec<String>,
    #[serde(rename = "excludeBannedUsers")]
    pub exclude_banned_users: bool,
}

/// Envelope shared by the platform's list-shaped responses.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Vec<T>,
}

/// One resolved user record.
#[derive(Debug, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

/// One avatar thumbnail record.
#[derive(Debug, Deserialize)]
pub struct ThumbnailRecord {
    #[serde(rename = "targetId")]
    pub target_id: u64,
    pub state: String,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

/// One friendship status record.
#[derive(Debug, Deserialize)]
pub struct FriendshipRecord {
    pub id: u64,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_record_parses_platform_shape() {
        let json = r#"{"data":[{"id":15273,"name":"CoolBuyer","displayName":"Cool Buyer","hasVerifiedBadge":false}]}"#;
        let envelope: DataEnvelope<UserRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.data[0].id, 15273);
        assert_eq!(envelope.data[0].display_name.as_deref(), Some("Cool Buyer"));
    }

    #[test]
    fn test_friendship_record_parses() {
        let json = r#"{"data":[{"id":15273,"status":"RequestSent"}]}"#;
        let envelope: DataEnvelope<FriendshipRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.data[0].status, "RequestSent");
    }
}
