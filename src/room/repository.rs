use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::models::RoomModel;
use crate::file::models::FileModel;
use crate::shared::AppError;

/// Trait for room repository operations.
///
/// Expired rooms are invisible to every read; only `remove_expired` sees
/// them. File metadata lives inside the room record so file mutations and
/// the room-existence check are a single atomic step.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn create(&self, room: &RoomModel) -> Result<(), AppError>;
    async fn get(&self, room_id: Uuid) -> Result<Option<RoomModel>, AppError>;
    /// Non-expired rooms in insertion order.
    async fn list(&self) -> Result<Vec<RoomModel>, AppError>;

    /// Atomically removes the room and returns it for cascading. This is the
    /// single linearizable "does this room still exist" check: whoever gets
    /// `Some` owns the cascade, so explicit delete and the expiry sweep can
    /// never double-run it.
    async fn remove(&self, room_id: Uuid) -> Result<Option<RoomModel>, AppError>;

    /// Removes every expired room, returning them for cascading.
    async fn remove_expired(&self) -> Result<Vec<RoomModel>, AppError>;

    /// Atomically consumes one unit of the room's session quota. `Ok(false)`
    /// means the quota is exhausted; rooms without a quota always allow.
    async fn consume_session_token(&self, room_id: Uuid) -> Result<bool, AppError>;

    /// Attaches file metadata, enforcing the per-room file `limit`.
    async fn add_file(
        &self,
        room_id: Uuid,
        file: FileModel,
        limit: usize,
    ) -> Result<(), AppError>;
    async fn get_file(&self, room_id: Uuid, file_id: Uuid) -> Result<Option<FileModel>, AppError>;
    async fn list_files(&self, room_id: Uuid) -> Result<Vec<FileModel>, AppError>;
    /// Detaches file metadata; the caller deletes the blob.
    async fn remove_file(
        &self,
        room_id: Uuid,
        file_id: Uuid,
    ) -> Result<Option<FileModel>, AppError>;
}

struct Entry {
    seq: u64,
    room: RoomModel,
}

/// In-memory implementation of RoomRepository
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<Uuid, Entry>>,
    next_seq: AtomicU64,
}

impl Default for InMemoryRoomRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self, room))]
    async fn create(&self, room: &RoomModel) -> Result<(), AppError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.contains_key(&room.id) {
            warn!(room_id = %room.id, "Room id collision");
            return Err(AppError::Conflict("Room already exists".to_string()));
        }
        rooms.insert(
            room.id,
            Entry {
                seq,
                room: room.clone(),
            },
        );

        debug!(room_id = %room.id, "Room created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, room_id: Uuid) -> Result<Option<RoomModel>, AppError> {
        let now = Utc::now();
        let rooms = self.rooms.lock().unwrap();
        let room = rooms
            .get(&room_id)
            .map(|e| &e.room)
            .filter(|r| !r.is_expired(now))
            .cloned();

        Ok(room)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<RoomModel>, AppError> {
        let now = Utc::now();
        let rooms = self.rooms.lock().unwrap();

        let mut entries: Vec<_> = rooms
            .values()
            .filter(|e| !e.room.is_expired(now))
            .collect();
        entries.sort_by_key(|e| e.seq);

        Ok(entries.into_iter().map(|e| e.room.clone()).collect())
    }

    #[instrument(skip(self))]
    async fn remove(&self, room_id: Uuid) -> Result<Option<RoomModel>, AppError> {
        let mut rooms = self.rooms.lock().unwrap();
        let removed = rooms.remove(&room_id).map(|e| e.room);

        debug!(room_id = %room_id, removed = removed.is_some(), "Room removal attempted");
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn remove_expired(&self) -> Result<Vec<RoomModel>, AppError> {
        let now = Utc::now();
        let mut rooms = self.rooms.lock().unwrap();

        let expired_ids: Vec<Uuid> = rooms
            .values()
            .filter(|e| e.room.is_expired(now))
            .map(|e| e.room.id)
            .collect();

        let mut expired = Vec::with_capacity(expired_ids.len());
        for id in expired_ids {
            if let Some(entry) = rooms.remove(&id) {
                expired.push(entry.room);
            }
        }

        Ok(expired)
    }

    #[instrument(skip(self))]
    async fn consume_session_token(&self, room_id: Uuid) -> Result<bool, AppError> {
        let now = Utc::now();
        let mut rooms = self.rooms.lock().unwrap();
        let room = rooms
            .get_mut(&room_id)
            .map(|e| &mut e.room)
            .filter(|r| !r.is_expired(now))
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        match room.tokens_remaining {
            None => Ok(true),
            Some(n) if n > 0 => {
                room.tokens_remaining = Some(n - 1);
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    #[instrument(skip(self, file))]
    async fn add_file(
        &self,
        room_id: Uuid,
        file: FileModel,
        limit: usize,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let mut rooms = self.rooms.lock().unwrap();
        let room = rooms
            .get_mut(&room_id)
            .map(|e| &mut e.room)
            .filter(|r| !r.is_expired(now))
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        if room.files.len() >= limit {
            return Err(AppError::Validation(format!(
                "Room is at its file limit of {}",
                limit
            )));
        }

        debug!(room_id = %room_id, file_id = %file.id, "File attached to room");
        room.files.push(file);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_file(&self, room_id: Uuid, file_id: Uuid) -> Result<Option<FileModel>, AppError> {
        let now = Utc::now();
        let rooms = self.rooms.lock().unwrap();
        let file = rooms
            .get(&room_id)
            .map(|e| &e.room)
            .filter(|r| !r.is_expired(now))
            .and_then(|r| r.file(file_id))
            .cloned();

        Ok(file)
    }

    #[instrument(skip(self))]
    async fn list_files(&self, room_id: Uuid) -> Result<Vec<FileModel>, AppError> {
        let now = Utc::now();
        let rooms = self.rooms.lock().unwrap();
        let room = rooms
            .get(&room_id)
            .map(|e| &e.room)
            .filter(|r| !r.is_expired(now))
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        Ok(room.files.clone())
    }

    #[instrument(skip(self))]
    async fn remove_file(
        &self,
        room_id: Uuid,
        file_id: Uuid,
    ) -> Result<Option<FileModel>, AppError> {
        let now = Utc::now();
        let mut rooms = self.rooms.lock().unwrap();
        let room = rooms
            .get_mut(&room_id)
            .map(|e| &mut e.room)
            .filter(|r| !r.is_expired(now))
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        let position = room.files.iter().position(|f| f.id == file_id);
        Ok(position.map(|i| room.files.remove(i)))
    }
}
