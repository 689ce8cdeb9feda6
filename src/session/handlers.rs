use axum::{
    extract::{Path, State},
    http::{header::SET_COOKIE, StatusCode},
    response::AppendHeaders,
    Extension, Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::middleware::{RoomPath, SESSION_COOKIE};
use super::types::{AuthRequest, AuthResponse, AuthedSession};
use crate::shared::{AppError, AppState};

/// HTTP handler for authenticating against a room
///
/// POST /rooms/:id/auth
/// Sets the session cookie scoped to the room path and echoes the token for
/// non-browser clients.
#[instrument(name = "auth_room", skip(state, request))]
pub async fn auth(
    State(state): State<AppState>,
    Path(RoomPath { id }): Path<RoomPath>,
    Json(request): Json<AuthRequest>,
) -> Result<(AppendHeaders<[(axum::http::HeaderName, String); 1]>, Json<AuthResponse>), AppError> {
    let session = state
        .session_service
        .create_session(id, &request.password)
        .await?;

    info!(room_id = %id, "Room authentication succeeded");

    let max_age = (session.expires_at - session.issued_at).num_seconds();
    let headers = AppendHeaders([(SET_COOKIE, session_cookie(id, &session.token, max_age))]);

    Ok((
        headers,
        Json(AuthResponse {
            token: session.token,
            expires_at: session.expires_at,
        }),
    ))
}

/// HTTP handler for revoking the caller's session
///
/// POST /rooms/:id/logout
#[instrument(name = "logout_room", skip(state, authed))]
pub async fn logout(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedSession>,
) -> Result<(AppendHeaders<[(axum::http::HeaderName, String); 1]>, StatusCode), AppError> {
    state
        .session_service
        .revoke_session(authed.room_id, &authed.token)
        .await?;

    info!(room_id = %authed.room_id, "Logged out");

    let headers = AppendHeaders([(SET_COOKIE, clear_cookie(authed.room_id))]);
    Ok((headers, StatusCode::NO_CONTENT))
}

/// HTTP handler for probing session validity
///
/// GET /rooms/:id/access
/// The auth middleware has already validated the session; this still
/// confirms the room itself is live, since an expired room is invisible
/// even to holders of an unexpired session.
#[instrument(name = "check_access", skip(state, authed))]
pub async fn check_access(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedSession>,
) -> Result<StatusCode, AppError> {
    state.room_service.get(authed.room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn session_cookie(room_id: Uuid, token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/rooms/{}; Max-Age={}; HttpOnly; SameSite=Strict",
        SESSION_COOKIE, token, room_id, max_age_secs
    )
}

pub fn clear_cookie(room_id: Uuid) -> String {
    format!(
        "{}=; Path=/rooms/{}; Max-Age=0; HttpOnly; SameSite=Strict",
        SESSION_COOKIE, room_id
    )
}
