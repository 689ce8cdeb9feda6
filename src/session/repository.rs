use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::models::SessionModel;
use crate::shared::AppError;

/// Trait for session repository operations
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert(&self, session: &SessionModel) -> Result<(), AppError>;
    /// Finds a session matching the exact (room, token) pair.
    async fn find(&self, room_id: Uuid, token: &str) -> Result<Option<SessionModel>, AppError>;
    /// Removes the session if present; returns whether one was removed.
    async fn remove(&self, room_id: Uuid, token: &str) -> Result<bool, AppError>;
    /// Removes every session referencing the room. Cascade hook for room
    /// deletion.
    async fn remove_all_for_room(&self, room_id: Uuid) -> Result<u64, AppError>;
    async fn cleanup_expired(&self) -> Result<u64, AppError>;
}

/// In-memory implementation of SessionRepository
///
/// Validation is read-mostly, so lookups take the shared lock; only
/// issue/revoke paths take the exclusive one. Sessions are process-local and
/// do not survive a restart.
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, SessionModel>>,
}

impl Default for InMemorySessionRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the current number of sessions in the repository
    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    #[instrument(skip(self, session))]
    async fn insert(&self, session: &SessionModel) -> Result<(), AppError> {
        let mut sessions = self.sessions.write().unwrap();
        sessions.insert(session.token.clone(), session.clone());

        debug!(room_id = %session.room_id, "Session stored");
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn find(&self, room_id: Uuid, token: &str) -> Result<Option<SessionModel>, AppError> {
        let sessions = self.sessions.read().unwrap();
        let session = sessions
            .get(token)
            .filter(|s| s.room_id == room_id)
            .cloned();

        Ok(session)
    }

    #[instrument(skip(self, token))]
    async fn remove(&self, room_id: Uuid, token: &str) -> Result<bool, AppError> {
        let mut sessions = self.sessions.write().unwrap();
        let matched = sessions
            .get(token)
            .map(|s| s.room_id == room_id)
            .unwrap_or(false);
        if matched {
            sessions.remove(token);
        }

        debug!(room_id = %room_id, removed = matched, "Session removal attempted");
        Ok(matched)
    }

    #[instrument(skip(self))]
    async fn remove_all_for_room(&self, room_id: Uuid) -> Result<u64, AppError> {
        let mut sessions = self.sessions.write().unwrap();
        let initial_count = sessions.len();

        sessions.retain(|_, session| session.room_id != room_id);

        let removed = (initial_count - sessions.len()) as u64;
        debug!(room_id = %room_id, removed, "Revoked all sessions for room");
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn cleanup_expired(&self) -> Result<u64, AppError> {
        let mut sessions = self.sessions.write().unwrap();
        let now = Utc::now();
        let initial_count = sessions.len();

        sessions.retain(|_, session| session.expires_at > now);

        let removed = (initial_count - sessions.len()) as u64;
        debug!(expired_sessions_removed = removed, "Expired sessions cleaned up");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session_for(room_id: Uuid, token: &str) -> SessionModel {
        SessionModel::new(token.to_string(), room_id, Duration::minutes(10))
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = InMemorySessionRepository::new();
        let room_id = Uuid::new_v4();

        repo.insert(&session_for(room_id, "tok-1")).await.unwrap();

        let found = repo.find(room_id, "tok-1").await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().room_id, room_id);
    }

    #[tokio::test]
    async fn test_find_requires_matching_room() {
        let repo = InMemorySessionRepository::new();
        let room_id = Uuid::new_v4();

        repo.insert(&session_for(room_id, "tok-1")).await.unwrap();

        let other_room = Uuid::new_v4();
        assert!(repo.find(other_room, "tok-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let repo = InMemorySessionRepository::new();
        let room_id = Uuid::new_v4();

        repo.insert(&session_for(room_id, "tok-1")).await.unwrap();

        assert!(repo.remove(room_id, "tok-1").await.unwrap());
        assert!(!repo.remove(room_id, "tok-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_with_wrong_room_leaves_session() {
        let repo = InMemorySessionRepository::new();
        let room_id = Uuid::new_v4();

        repo.insert(&session_for(room_id, "tok-1")).await.unwrap();

        assert!(!repo.remove(Uuid::new_v4(), "tok-1").await.unwrap());
        assert!(repo.find(room_id, "tok-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_all_for_room() {
        let repo = InMemorySessionRepository::new();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();

        repo.insert(&session_for(room_a, "a-1")).await.unwrap();
        repo.insert(&session_for(room_a, "a-2")).await.unwrap();
        repo.insert(&session_for(room_b, "b-1")).await.unwrap();

        let removed = repo.remove_all_for_room(room_a).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repo.session_count(), 1);
        assert!(repo.find(room_b, "b-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let repo = InMemorySessionRepository::new();
        let room_id = Uuid::new_v4();

        repo.insert(&session_for(room_id, "live")).await.unwrap();
        repo.insert(&SessionModel::new(
            "stale".to_string(),
            room_id,
            Duration::minutes(-1),
        ))
        .await
        .unwrap();

        let removed = repo.cleanup_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert!(repo.find(room_id, "live").await.unwrap().is_some());
        assert!(repo.find(room_id, "stale").await.unwrap().is_none());
    }
}
