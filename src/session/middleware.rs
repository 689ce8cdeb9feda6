use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::types::AuthedSession;
use crate::shared::{AppError, AppState};

pub const SESSION_COOKIE: &str = "auth_token";

#[derive(Debug, Deserialize)]
pub struct RoomPath {
    pub id: Uuid,
}

/// Session authentication middleware for room-scoped routes.
/// Accepts the token from an `Authorization: Bearer` header or the
/// `auth_token` cookie, validates it against the room in the path, and adds
/// `AuthedSession` to the request extensions.
/// Usage: .layer(middleware::from_fn_with_state(state.clone(), session::session_auth))
#[instrument(skip(state, req, next))]
pub async fn session_auth(
    State(state): State<AppState>,
    Path(RoomPath { id: room_id }): Path<RoomPath>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&req).ok_or_else(|| {
        warn!(room_id = %room_id, "Missing session token");
        AppError::Unauthorized("Missing session token".to_string())
    })?;

    if let Err(e) = state.session_service.validate_session(room_id, &token).await {
        warn!(room_id = %room_id, error = %e, "Session validation failed");
        return Err(e);
    }

    req.extensions_mut().insert(AuthedSession { room_id, token });

    Ok(next.run(req).await)
}

/// Pulls the session token out of the request: `Authorization: Bearer` wins,
/// the session cookie is the fallback (browser clients send the cookie).
fn extract_token(req: &Request) -> Option<String> {
    if let Some(raw) = req
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
    {
        if let Some(token) = raw.trim().strip_prefix("Bearer ") {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
        return None;
    }

    cookie_value(req, SESSION_COOKIE)
}

fn cookie_value(req: &Request, name: &str) -> Option<String> {
    let raw = req.headers().get("Cookie")?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}
