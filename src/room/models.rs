use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::file::models::FileModel;

/// A password-gated, time-limited container for files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomModel {
    pub id: Uuid,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Sessions still issuable for this room; `None` means quotas are off.
    pub tokens_remaining: Option<i64>,
    pub files: Vec<FileModel>,
}

impl RoomModel {
    pub fn new(password_hash: String, lifespan: Duration, token_quota: Option<i64>) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            password_hash,
            created_at: now,
            expires_at: now + lifespan,
            tokens_remaining: token_quota,
            files: Vec::new(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn file(&self, file_id: Uuid) -> Option<&FileModel> {
        self.files.iter().find(|f| f.id == file_id)
    }
}
