use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use droproom::file::service::FileService;
use droproom::file::store::MemoryBlobStore;
use droproom::room::repository::InMemoryRoomRepository;
use droproom::room::service::RoomService;
use droproom::session::repository::InMemorySessionRepository;
use droproom::session::service::SessionService;
use droproom::{AppState, Config, EventBus, RelayBroker};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
}

pub struct TestAppBuilder {
    config: Config,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_token_quota(mut self, quota: i64) -> Self {
        self.config.room_token_quota = Some(quota);
        self
    }

    pub fn with_relay_wait(mut self, wait: Duration) -> Self {
        self.config.relay_wait = wait;
        self
    }

    pub fn build(self) -> TestApp {
        let config = Arc::new(self.config);
        let room_repository = Arc::new(InMemoryRoomRepository::new());
        let session_repository = Arc::new(InMemorySessionRepository::new());
        let blob_store = Arc::new(MemoryBlobStore::new());
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
            room_service,
            file_service,
            relay_broker,
            event_bus,
            config,
        };

        TestApp {
            app: droproom::app(state.clone()),
            state,
        }
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}
