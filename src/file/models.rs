use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata for a file stored in a room. The bytes themselves live in the
/// blob store under `blob_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileModel {
    pub id: Uuid,
    pub room_id: Uuid,
    pub name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub blob_key: String,
}

impl FileModel {
    pub fn new(room_id: Uuid, name: String, size: u64, blob_key: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            name,
            size,
            created_at: Utc::now(),
            blob_key,
        }
    }
}

/// Wire representation of a room file
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&FileModel> for FileResponse {
    fn from(file: &FileModel) -> Self {
        Self {
            id: file.id,
            name: file.name.clone(),
            size: file.size,
            created_at: file.created_at,
        }
    }
}
