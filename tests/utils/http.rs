use axum::body::{to_bytes, Body};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt; // for `oneshot`

// ============================================================================
// Request helpers
// ============================================================================

pub const MULTIPART_BOUNDARY: &str = "test-boundary-7bd94c";

pub async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    app.clone().oneshot(request).await.unwrap()
}

pub async fn send_with_token(app: &Router, method: &str, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    app.clone().oneshot(request).await.unwrap()
}

pub async fn send_empty(app: &Router, method: &str, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    app.clone().oneshot(request).await.unwrap()
}

/// Uploads `content` as a multipart `file` part, optionally authenticated.
pub async fn send_multipart(
    app: &Router,
    uri: &str,
    token: Option<&str>,
    filename: &str,
    content: &[u8],
) -> Response<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header(
        "content-type",
        format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
    );
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let request = builder
        .body(Body::from(multipart_body(filename, content)))
        .unwrap();

    app.clone().oneshot(request).await.unwrap()
}

pub fn multipart_body(filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}

// ============================================================================
// Response helpers
// ============================================================================

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn raw_body(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "unexpected status for response: {:?}",
        response
    );
}

// ============================================================================
// Workflow helpers
// ============================================================================

/// Creates a room and returns (room_id, creator_token).
pub async fn create_room(app: &Router, password: &str, lifespan: i64) -> (String, String) {
    let response = send_json(
        app,
        "POST",
        "/rooms",
        serde_json::json!({ "password": password, "lifespan": lifespan }),
    )
    .await;
    assert_status(&response, StatusCode::OK);

    let body = json_body(response).await;
    let room_id = body["id"].as_str().unwrap().to_string();
    let token = body["token"].as_str().unwrap().to_string();
    (room_id, token)
}

/// Authenticates against a room and returns the session token.
pub async fn auth_room(app: &Router, room_id: &str, password: &str) -> String {
    let response = send_json(
        app,
        "POST",
        &format!("/rooms/{}/auth", room_id),
        serde_json::json!({ "password": password }),
    )
    .await;
    assert_status(&response, StatusCode::OK);

    let body = json_body(response).await;
    body["token"].as_str().unwrap().to_string()
}
