use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, instrument, warn};

use crate::shared::AppError;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send + 'static>>;

/// Content-addressable blob storage, keyed by opaque keys the file service
/// generates. Implementations must stream; callers may hand them payloads
/// larger than memory.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Streams `reader` to storage under `key`, returning the byte count.
    async fn put(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, AppError>;

    /// Opens the blob for streaming reads.
    async fn open(&self, key: &str) -> Result<ByteStream, AppError>;

    /// Removes the blob. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Blob store backed by a directory on disk
pub struct DiskBlobStore {
    root: PathBuf,
}

impl DiskBlobStore {
    /// Creates the store, making sure the directory exists.
    pub async fn new(root: PathBuf) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            warn!(error = %e, path = %root.display(), "Cannot create blob directory");
            AppError::Storage(format!("cannot create blob directory: {}", e))
        })?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are generated UUIDs, never caller input.
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    #[instrument(skip(self, reader))]
    async fn put(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, AppError> {
        let path = self.path_for(key);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| AppError::Storage(format!("cannot create blob: {}", e)))?;

        match tokio::io::copy(reader, &mut file).await {
            Ok(size) => {
                debug!(key = %key, size, "Blob written");
                Ok(size)
            }
            Err(e) => {
                // Drop the partial write so a failed upload leaves nothing.
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                Err(AppError::Storage(format!("blob write failed: {}", e)))
            }
        }
    }

    #[instrument(skip(self))]
    async fn open(&self, key: &str) -> Result<ByteStream, AppError> {
        let path = self.path_for(key);
        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                AppError::NotFound("Blob not found".to_string())
            } else {
                AppError::Storage(format!("cannot open blob: {}", e))
            }
        })?;

        Ok(Box::pin(tokio_util::io::ReaderStream::new(file)))
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), AppError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(key = %key, "Blob already gone");
                Ok(())
            }
            Err(e) => Err(AppError::Storage(format!("cannot delete blob: {}", e))),
        }
    }
}

/// In-memory blob store for tests and development
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Bytes>>,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, AppError> {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| AppError::Storage(format!("blob read failed: {}", e)))?;

        let size = buf.len() as u64;
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::from(buf));
        Ok(size)
    }

    async fn open(&self, key: &str) -> Result<ByteStream, AppError> {
        let blob = self
            .blobs
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Blob not found".to_string()))?;

        Ok(Box::pin(futures::stream::once(async move { Ok(blob) })))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.blobs.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryBlobStore::new();
        let mut payload: &[u8] = b"hello blob";

        let size = store.put("key-1", &mut payload).await.unwrap();
        assert_eq!(size, 10);

        let stream = store.open("key-1").await.unwrap();
        assert_eq!(collect(stream).await, b"hello blob");
    }

    #[tokio::test]
    async fn test_memory_store_open_missing() {
        let store = MemoryBlobStore::new();
        let result = store.open("nope").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_memory_store_delete_is_idempotent() {
        let store = MemoryBlobStore::new();
        let mut payload: &[u8] = b"x";
        store.put("key-1", &mut payload).await.unwrap();

        store.delete("key-1").await.unwrap();
        store.delete("key-1").await.unwrap();
        assert_eq!(store.blob_count(), 0);
    }

    #[tokio::test]
    async fn test_disk_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskBlobStore::new(dir.path().to_path_buf()).await.unwrap();

        let mut payload: &[u8] = b"on disk";
        let size = store.put("key-1", &mut payload).await.unwrap();
        assert_eq!(size, 7);

        let stream = store.open("key-1").await.unwrap();
        assert_eq!(collect(stream).await, b"on disk");

        store.delete("key-1").await.unwrap();
        assert!(matches!(
            store.open("key-1").await,
            Err(AppError::NotFound(_))
        ));
    }
}
