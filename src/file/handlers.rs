use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use futures::TryStreamExt;
use serde::Deserialize;
use std::io;
use tokio_util::io::StreamReader;
use tracing::instrument;
use uuid::Uuid;

use super::models::FileResponse;
use crate::session::types::AuthedSession;
use crate::shared::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct RoomFilePath {
    pub id: Uuid,
    pub fid: Uuid,
}

/// HTTP handler for listing a room's files
///
/// GET /rooms/:id/files
#[instrument(name = "list_files", skip(state, authed))]
pub async fn list_files(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedSession>,
) -> Result<Json<Vec<FileResponse>>, AppError> {
    let files = state.file_service.list(authed.room_id).await?;
    Ok(Json(files.iter().map(FileResponse::from).collect()))
}

/// HTTP handler for uploading a file into a room
///
/// POST /rooms/:id/files
/// The multipart `file` part is streamed straight into the blob store; the
/// payload never sits in memory as a whole.
#[instrument(name = "upload_file", skip(state, authed, multipart))]
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(authed): Extension<AuthedSession>,
    mut multipart: Multipart,
) -> Result<Json<FileResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let stream = field.map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let mut reader = StreamReader::new(Box::pin(stream));

        let file = state
            .file_service
            .upload(authed.room_id, &filename, &mut reader)
            .await?;

        return Ok(Json(FileResponse::from(&file)));
    }

    Err(AppError::Validation(
        "Missing multipart field 'file'".to_string(),
    ))
}

/// HTTP handler for downloading a file
///
/// GET /rooms/:id/files/:fid/download
/// Streams the blob; the filename travels in the content-disposition header.
#[instrument(name = "download_file", skip(state, _authed))]
pub async fn download_file(
    State(state): State<AppState>,
    Extension(_authed): Extension<AuthedSession>,
    Path(RoomFilePath { id, fid }): Path<RoomFilePath>,
) -> Result<impl IntoResponse, AppError> {
    let (file, stream) = state.file_service.download(id, fid).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file.size));
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(&file.name),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok((headers, Body::from_stream(stream)))
}

/// HTTP handler for deleting a file
///
/// DELETE /rooms/:id/files/:fid
#[instrument(name = "delete_file", skip(state, _authed))]
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(_authed): Extension<AuthedSession>,
    Path(RoomFilePath { id, fid }): Path<RoomFilePath>,
) -> Result<StatusCode, AppError> {
    state.file_service.delete(id, fid).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Builds an attachment header, quoting the filename and dropping anything
/// that would break out of the quoted string.
pub fn content_disposition(filename: &str) -> HeaderValue {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", sanitized))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
