use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use futures::TryStreamExt;
use serde::Deserialize;
use std::io;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::file::handlers::content_disposition;
use crate::shared::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct DirectPath {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct WaitQuery {
    /// How long to wait for a sender, in seconds. `0` waits until the
    /// connection is closed.
    pub wait: Option<u64>,
}

/// HTTP handler for the receiving side of a direct transfer
///
/// GET /direct/:code/download
/// Long-lived: the response does not start until a sender pairs on the same
/// code. Closing the connection cancels the wait and frees the code.
#[instrument(name = "direct_download", skip(state))]
pub async fn download_direct(
    State(state): State<AppState>,
    Path(DirectPath { code }): Path<DirectPath>,
    Query(query): Query<WaitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let wait = match query.wait {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => Some(state.relay_broker.default_wait()),
    };

    let transfer = state
        .relay_broker
        .register_and_wait(code.trim(), wait)
        .await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(&transfer.filename),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok((headers, Body::from_stream(transfer.into_stream())))
}

/// HTTP handler for the sending side of a direct transfer
///
/// POST /direct/:code/upload
/// The multipart `file` part is relayed chunk-by-chunk into the waiting
/// receiver's response. Fails with 404 when nobody is waiting on the code.
#[instrument(name = "direct_upload", skip(state, multipart))]
pub async fn upload_direct(
    State(state): State<AppState>,
    Path(DirectPath { code }): Path<DirectPath>,
    mut multipart: Multipart,
) -> Result<StatusCode, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let payload = field.map_err(|e| io::Error::new(io::ErrorKind::Other, e));

        let sent = state
            .relay_broker
            .send(code.trim(), &filename, Box::pin(payload))
            .await?;

        debug!(code = %code, sent, "Direct transfer relayed");
        return Ok(StatusCode::NO_CONTENT);
    }

    Err(AppError::Validation(
        "Missing multipart field 'file'".to_string(),
    ))
}
