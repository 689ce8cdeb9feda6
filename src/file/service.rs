use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::models::FileModel;
use super::store::{BlobStore, ByteStream};
use crate::room::repository::RoomRepository;
use crate::shared::AppError;

/// Service for room-scoped file operations
///
/// Composes the room registry (which owns the metadata and the atomic
/// room-existence check) with the injectable blob store (which owns the
/// bytes).
pub struct FileService {
    rooms: Arc<dyn RoomRepository>,
    blobs: Arc<dyn BlobStore>,
    max_files_per_room: usize,
}

impl FileService {
    pub fn new(
        rooms: Arc<dyn RoomRepository>,
        blobs: Arc<dyn BlobStore>,
        max_files_per_room: usize,
    ) -> Self {
        Self {
            rooms,
            blobs,
            max_files_per_room,
        }
    }

    /// Streams an upload into the blob store and attaches its metadata to
    /// the room. If the attach fails the orphaned blob is removed again.
    #[instrument(skip(self, reader))]
    pub async fn upload(
        &self,
        room_id: Uuid,
        name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<FileModel, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(
                "Filename must not be empty".to_string(),
            ));
        }

        self.rooms
            .get(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        let blob_key = Uuid::new_v4().to_string();
        let size = self.blobs.put(&blob_key, reader).await?;

        let file = FileModel::new(room_id, name.to_string(), size, blob_key.clone());
        if let Err(e) = self
            .rooms
            .add_file(room_id, file.clone(), self.max_files_per_room)
            .await
        {
            // The room vanished or is full; do not leak the bytes.
            warn!(room_id = %room_id, error = %e, "Attach failed, dropping blob");
            let _ = self.blobs.delete(&blob_key).await;
            return Err(e);
        }

        info!(room_id = %room_id, file_id = %file.id, size, "File uploaded");
        Ok(file)
    }

    /// Opens a file for a streamed download.
    #[instrument(skip(self))]
    pub async fn download(
        &self,
        room_id: Uuid,
        file_id: Uuid,
    ) -> Result<(FileModel, ByteStream), AppError> {
        let file = self
            .rooms
            .get_file(room_id, file_id)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        let stream = self.blobs.open(&file.blob_key).await?;
        Ok((file, stream))
    }

    /// Lists the room's files.
    #[instrument(skip(self))]
    pub async fn list(&self, room_id: Uuid) -> Result<Vec<FileModel>, AppError> {
        self.rooms.list_files(room_id).await
    }

    /// Removes a file and its blob.
    #[instrument(skip(self))]
    pub async fn delete(&self, room_id: Uuid, file_id: Uuid) -> Result<(), AppError> {
        let file = self
            .rooms
            .remove_file(room_id, file_id)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        self.blobs.delete(&file.blob_key).await?;

        info!(room_id = %room_id, file_id = %file_id, "File deleted");
        Ok(())
    }
}
