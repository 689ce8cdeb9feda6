use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    models::SessionModel, password::verify_password, repository::SessionRepository,
    token::TokenConfig,
};
use crate::config::Config;
use crate::room::repository::RoomRepository;
use crate::shared::AppError;

/// Service for handling session business logic
///
/// Owns the token layer and the session store; the room repository is only
/// consulted for password verification and quota accounting.
pub struct SessionService {
    token_config: TokenConfig,
    repository: Arc<dyn SessionRepository>,
    rooms: Arc<dyn RoomRepository>,
}

impl SessionService {
    pub fn new(
        repository: Arc<dyn SessionRepository>,
        rooms: Arc<dyn RoomRepository>,
        config: &Config,
    ) -> Self {
        Self {
            token_config: TokenConfig::new(&config.jwt_secret, config.session_ttl),
            repository,
            rooms,
        }
    }

    /// Authenticates against a room's password and issues a session.
    ///
    /// A missing, expired, or wrong-password room all fail the same way so
    /// callers cannot probe which rooms exist.
    #[instrument(skip(self, supplied_password))]
    pub async fn create_session(
        &self,
        room_id: Uuid,
        supplied_password: &str,
    ) -> Result<SessionModel, AppError> {
        let denied = || AppError::Unauthorized("Unknown room or bad password".to_string());

        let room = self.rooms.get(room_id).await?.ok_or_else(denied)?;

        if !verify_password(supplied_password, &room.password_hash) {
            warn!(room_id = %room_id, "Password verification failed");
            return Err(denied());
        }

        self.issue_session(room_id).await.map_err(|e| match e {
            AppError::NotFound(_) => denied(),
            other => other,
        })
    }

    /// Issues a session without a password check. Used after password
    /// verification and for the creator of a freshly made room.
    #[instrument(skip(self))]
    pub async fn issue_session(&self, room_id: Uuid) -> Result<SessionModel, AppError> {
        if !self.rooms.consume_session_token(room_id).await? {
            warn!(room_id = %room_id, "Session quota exhausted");
            return Err(AppError::Unauthorized(
                "Session quota exhausted for this room".to_string(),
            ));
        }

        let token = self.token_config.create_token(room_id)?;
        let session = SessionModel::new(token, room_id, self.token_config.ttl);
        self.repository.insert(&session).await?;

        info!(room_id = %room_id, "Session issued");
        Ok(session)
    }

    /// Validates a token against both its signature and the session store,
    /// so revoked sessions fail immediately even with a structurally valid
    /// token.
    #[instrument(skip(self, token))]
    pub async fn validate_session(
        &self,
        room_id: Uuid,
        token: &str,
    ) -> Result<SessionModel, AppError> {
        let claims = self.token_config.validate_token(token)?;
        if claims.room_id != room_id {
            warn!(room_id = %room_id, "Token issued for a different room");
            return Err(AppError::Unauthorized(
                "Token was not issued for this room".to_string(),
            ));
        }

        match self.repository.find(room_id, token).await? {
            Some(session) if !session.is_expired() => Ok(session),
            Some(_) => Err(AppError::Unauthorized("Session has expired".to_string())),
            None => Err(AppError::Unauthorized(
                "Session not found or has been revoked".to_string(),
            )),
        }
    }

    /// Revokes a session. Idempotent; revoking an absent session is not an
    /// error.
    #[instrument(skip(self, token))]
    pub async fn revoke_session(&self, room_id: Uuid, token: &str) -> Result<(), AppError> {
        let removed = self.repository.remove(room_id, token).await?;
        info!(room_id = %room_id, removed, "Session revoked");
        Ok(())
    }

    /// Removes every session for a room. Invoked by the room-deletion
    /// cascade.
    #[instrument(skip(self))]
    pub async fn revoke_all_for_room(&self, room_id: Uuid) -> Result<u64, AppError> {
        self.repository.remove_all_for_room(room_id).await
    }
}
