use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims carried by every session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub room_id: Uuid,
    pub jti: String,
    pub exp: usize, // Expiration timestamp (standard JWT claim)
    pub iat: usize, // Issued at timestamp (standard JWT claim)
}

/// Request body for the room authentication endpoint
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub password: String,
}

/// Response for a successfully issued session
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Authenticated request context injected by the session middleware
#[derive(Debug, Clone)]
pub struct AuthedSession {
    pub room_id: Uuid,
    pub token: String,
}
