mod config;
mod event;
mod file;
mod relay;
mod room;
mod routes;
mod session;
mod shared;

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use event::EventBus;
use file::service::FileService;
use file::store::DiskBlobStore;
use relay::RelayBroker;
use room::repository::InMemoryRoomRepository;
use room::service::RoomService;
use room::sweep::run_expiry_sweep;
use session::repository::InMemorySessionRepository;
use session::service::SessionService;
use shared::AppState;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "droproom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting droproom file-share server");

    let config = Arc::new(Config::from_env().unwrap());

    // Wire shared application state. Rooms and sessions are in-memory;
    // only file bytes touch disk.
    let room_repository = Arc::new(InMemoryRoomRepository::new());
    let session_repository = Arc::new(InMemorySessionRepository::new());
    let blob_store = Arc::new(
        DiskBlobStore::new(config.upload_dir.clone())
            .await
            .unwrap(),
    );
    let event_bus = EventBus::new(64);

    let session_service = Arc::new(SessionService::new(
        session_repository.clone(),
        room_repository.clone(),
        &config,
    ));
    let room_service = Arc::new(RoomService::new(
        room_repository.clone(),
        session_repository,
        blob_store.clone(),
        event_bus.clone(),
        &config,
    ));
    let file_service = Arc::new(FileService::new(
        room_repository,
        blob_store,
        config.max_files_per_room,
    ));
    let relay_broker = Arc::new(RelayBroker::new(config.relay_wait));

    let state = AppState {
        session_service,
        room_service: room_service.clone(),
        file_service,
        relay_broker,
        event_bus,
        config: config.clone(),
    };

    // Background expiry sweep for rooms past their lifespan
    tokio::spawn(run_expiry_sweep(room_service, config.sweep_interval));

    let app = routes::app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    info!("Server running on http://localhost:{}", config.port);
    axum::serve(listener, app).await.unwrap();
}
