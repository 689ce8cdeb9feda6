use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use super::{
    models::RoomModel,
    repository::RoomRepository,
    types::RoomResponse,
};
use crate::config::Config;
use crate::event::{ChangeEvent, EventBus};
use crate::file::store::BlobStore;
use crate::session::password::hash_password;
use crate::session::repository::SessionRepository;
use crate::shared::AppError;

/// Service for handling room business logic
///
/// Owns the lifecycle: creation publishes a change event, deletion and the
/// expiry sweep cascade to sessions and blobs before announcing the change.
pub struct RoomService {
    repository: Arc<dyn RoomRepository>,
    sessions: Arc<dyn SessionRepository>,
    blobs: Arc<dyn BlobStore>,
    event_bus: EventBus,
    max_lifespan: Duration,
    token_quota: Option<i64>,
}

impl RoomService {
    pub fn new(
        repository: Arc<dyn RoomRepository>,
        sessions: Arc<dyn SessionRepository>,
        blobs: Arc<dyn BlobStore>,
        event_bus: EventBus,
        config: &Config,
    ) -> Self {
        Self {
            repository,
            sessions,
            blobs,
            event_bus,
            max_lifespan: Duration::seconds(config.max_room_lifespan.as_secs() as i64),
            token_quota: config.room_token_quota,
        }
    }

    /// Creates a new room and announces it on the bus
    #[instrument(skip(self, password))]
    pub async fn create(&self, password: &str, lifespan_secs: i64) -> Result<RoomModel, AppError> {
        let password = password.trim();
        if password.is_empty() {
            return Err(AppError::Validation(
                "Password must not be empty".to_string(),
            ));
        }
        if lifespan_secs <= 0 {
            return Err(AppError::Validation(
                "Lifespan must be positive".to_string(),
            ));
        }
        let lifespan = Duration::seconds(lifespan_secs);
        if lifespan > self.max_lifespan {
            return Err(AppError::Validation(format!(
                "Lifespan exceeds the maximum of {} seconds",
                self.max_lifespan.num_seconds()
            )));
        }

        let room = RoomModel::new(hash_password(password)?, lifespan, self.token_quota);
        self.repository.create(&room).await?;

        info!(room_id = %room.id, expires_at = %room.expires_at, "Room created");
        self.event_bus
            .publish(ChangeEvent::rooms_change(room.id.to_string()));

        Ok(room)
    }

    /// Lists all live rooms
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<RoomResponse>, AppError> {
        let rooms = self.repository.list().await?;
        debug!(room_count = rooms.len(), "Rooms listed");

        Ok(rooms.iter().map(RoomResponse::from).collect())
    }

    /// Gets room details for API callers
    #[instrument(skip(self))]
    pub async fn get(&self, room_id: Uuid) -> Result<RoomResponse, AppError> {
        let room = self
            .repository
            .get(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        Ok(RoomResponse::from(&room))
    }

    /// Deletes a room, cascading to its blobs and sessions. Returns whether
    /// a room was actually removed, so the gateway can tell "already gone"
    /// from "failed".
    #[instrument(skip(self))]
    pub async fn delete(&self, room_id: Uuid) -> Result<bool, AppError> {
        let Some(room) = self.repository.remove(room_id).await? else {
            debug!(room_id = %room_id, "Delete of absent room");
            return Ok(false);
        };

        self.cascade(&room).await;

        info!(room_id = %room_id, "Room deleted");
        self.event_bus
            .publish(ChangeEvent::rooms_change(room_id.to_string()));

        Ok(true)
    }

    /// Removes every expired room with the same cascade as `delete`.
    /// Invoked by the background sweep; returns how many rooms went away.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> Result<usize, AppError> {
        let expired = self.repository.remove_expired().await?;

        for room in &expired {
            self.cascade(room).await;
        }

        // Sessions can outlive nothing, but they can expire on their own.
        let stale_sessions = self.sessions.cleanup_expired().await?;
        debug!(stale_sessions, "Session cleanup completed");

        if !expired.is_empty() {
            let ids = expired
                .iter()
                .map(|r| r.id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            info!(deleted_count = expired.len(), "Expired rooms swept");
            self.event_bus.publish(ChangeEvent::rooms_change(ids));
        }

        Ok(expired.len())
    }

    /// Deletes the room's blobs and revokes its sessions. Blob failures are
    /// logged and skipped; the cascade must run to completion.
    async fn cascade(&self, room: &RoomModel) {
        for file in &room.files {
            if let Err(e) = self.blobs.delete(&file.blob_key).await {
                error!(
                    room_id = %room.id,
                    file_id = %file.id,
                    error = %e,
                    "Failed to delete blob during cascade"
                );
            }
        }

        if let Err(e) = self.sessions.remove_all_for_room(room.id).await {
            error!(room_id = %room.id, error = %e, "Failed to revoke sessions during cascade");
        }
    }
}
