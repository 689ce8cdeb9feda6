use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

use super::types::SessionClaims;
use crate::shared::AppError;

/// Configuration for JWT token operations
#[derive(Clone)]
pub struct TokenConfig {
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: &[u8], ttl: std::time::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::seconds(ttl.as_secs() as i64),
        }
    }

    /// Creates a new token bound to the given room
    pub fn create_token(&self, room_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();

        let claims = SessionClaims {
            room_id,
            jti: Uuid::new_v4().to_string(),
            exp: (now + self.ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            debug!(error = %e, "Failed to encode session token");
            AppError::Internal
        })
    }

    /// Validates a token's signature and expiry and returns its claims
    pub fn validate_token(&self, token: &str) -> Result<SessionClaims, AppError> {
        decode::<SessionClaims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Failed to decode session token");
                AppError::Unauthorized("Invalid or expired token".to_string())
            })
    }
}
