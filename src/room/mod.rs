// Room registry: password-protected, time-limited file containers, their
// HTTP surface, and the background expiry sweep.

pub use service::RoomService;

pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod sweep;
pub mod types;
