// Library crate for the droproom file-share server
// This file exposes the public API for integration tests

pub mod config;
pub mod event;
pub mod file;
pub mod relay;
pub mod room;
pub mod routes;
pub mod session;
pub mod shared;

// Re-export commonly used types for easier access in tests
pub use config::Config;
pub use event::{ChangeEvent, ChangeKind, EventBus};
pub use relay::{RelayBroker, RelayError};
pub use routes::app;
pub use shared::{AppError, AppState};
