use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::event;
use crate::file;
use crate::relay;
use crate::room;
use crate::session;
use crate::shared::AppState;

/// Assembles the full application router.
///
/// Room-scoped routes sit behind the session middleware; room creation,
/// listing, authentication, the direct relay, and SSE are public. Body
/// limits are lifted on the two streaming upload paths.
pub fn app(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/ping", get(ping))
        .route(
            "/rooms",
            get(room::handlers::list_rooms).post(room::handlers::create_room),
        )
        .route("/rooms/:id/auth", post(session::handlers::auth))
        .route("/sse", get(event::handlers::subscribe));

    let direct = Router::new()
        .route("/direct/:code/download", get(relay::handlers::download_direct))
        .route("/direct/:code/upload", post(relay::handlers::upload_direct))
        .layer(DefaultBodyLimit::disable());

    let secured = Router::new()
        .route(
            "/rooms/:id",
            get(room::handlers::get_room).delete(room::handlers::delete_room),
        )
        .route("/rooms/:id/logout", post(session::handlers::logout))
        .route("/rooms/:id/access", get(session::handlers::check_access))
        .route(
            "/rooms/:id/files",
            get(file::handlers::list_files).post(file::handlers::upload_file),
        )
        .route(
            "/rooms/:id/files/:fid/download",
            get(file::handlers::download_file),
        )
        .route("/rooms/:id/files/:fid", delete(file::handlers::delete_file))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_auth,
        ))
        .layer(DefaultBodyLimit::disable());

    Router::new()
        .merge(public)
        .merge(direct)
        .merge(secured)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn ping() -> &'static str {
    "pong"
}
