use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored session binding a token to the room it was issued for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionModel {
    pub token: String,
    pub room_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionModel {
    pub fn new(token: String, room_id: Uuid, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            token,
            room_id,
            issued_at: now,
            expires_at: now + ttl,
        }
    }

    /// Checks whether the session has expired. Sessions are refresh-free;
    /// past this point the caller has to authenticate again.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
