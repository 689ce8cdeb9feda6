use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::RoomModel;

/// Request body for room creation
#[derive(Debug, Deserialize)]
pub struct RoomCreateRequest {
    pub password: String,
    /// Room lifespan in seconds.
    pub lifespan: i64,
}

/// Wire representation of a room
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub files: usize,
    /// Sessions still issuable; absent when quotas are disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<i64>,
}

impl From<&RoomModel> for RoomResponse {
    fn from(room: &RoomModel) -> Self {
        Self {
            id: room.id,
            created_at: room.created_at,
            expires_at: room.expires_at,
            files: room.file_count(),
            tokens: room.tokens_remaining,
        }
    }
}

/// Result flag for room deletion, so callers can tell "already gone" from
/// "failed"
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomDeleteResponse {
    pub removed: bool,
}
