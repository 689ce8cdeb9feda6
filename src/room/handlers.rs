use axum::{
    extract::{Path, State},
    http::header::SET_COOKIE,
    response::AppendHeaders,
    Extension, Json,
};
use serde::Serialize;
use tracing::{info, instrument};

use super::types::{RoomCreateRequest, RoomDeleteResponse, RoomResponse};
use crate::session::handlers::{clear_cookie, session_cookie};
use crate::session::middleware::RoomPath;
use crate::session::types::AuthedSession;
use crate::shared::{AppError, AppState};

/// Response for room creation: the room plus the creator's session token
#[derive(Debug, Serialize)]
pub struct RoomCreateResponse {
    #[serde(flatten)]
    pub room: RoomResponse,
    pub token: String,
}

/// HTTP handler for creating a new room
///
/// POST /rooms
/// The creator gets a session straight away; the cookie is scoped to the
/// room path so browsers only present it where it matters.
#[instrument(name = "create_room", skip(state, request))]
pub async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<RoomCreateRequest>,
) -> Result<
    (
        AppendHeaders<[(axum::http::HeaderName, String); 1]>,
        Json<RoomCreateResponse>,
    ),
    AppError,
> {
    let room = state
        .room_service
        .create(&request.password, request.lifespan)
        .await?;

    let session = state.session_service.issue_session(room.id).await?;

    info!(room_id = %room.id, "Room created with creator session");

    // The quota consumed by the creator session is not reflected in the
    // snapshot taken above; re-read so the response shows current numbers.
    let response = state.room_service.get(room.id).await?;

    let max_age = (session.expires_at - session.issued_at).num_seconds();
    let headers = AppendHeaders([(SET_COOKIE, session_cookie(room.id, &session.token, max_age))]);

    Ok((
        headers,
        Json(RoomCreateResponse {
            room: response,
            token: session.token,
        }),
    ))
}

/// HTTP handler for listing all live rooms
///
/// GET /rooms
#[instrument(name = "list_rooms", skip(state))]
pub async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<RoomResponse>>, AppError> {
    let rooms = state.room_service.list().await?;
    Ok(Json(rooms))
}

/// HTTP handler for room detail
///
/// GET /rooms/:id
#[instrument(name = "get_room", skip(state))]
pub async fn get_room(
    State(state): State<AppState>,
    Path(RoomPath { id }): Path<RoomPath>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = state.room_service.get(id).await?;
    Ok(Json(room))
}

/// HTTP handler for deleting a room
///
/// DELETE /rooms/:id
/// Idempotent from the caller's perspective: deleting an already-gone room
/// answers `removed: false` rather than an error.
#[instrument(name = "delete_room", skip(state, authed))]
pub async fn delete_room(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedSession>,
) -> Result<
    (
        AppendHeaders<[(axum::http::HeaderName, String); 1]>,
        Json<RoomDeleteResponse>,
    ),
    AppError,
> {
    let removed = state.room_service.delete(authed.room_id).await?;

    let headers = AppendHeaders([(SET_COOKIE, clear_cookie(authed.room_id))]);
    Ok((headers, Json(RoomDeleteResponse { removed })))
}
