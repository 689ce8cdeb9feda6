// Session store: password-derived, per-room session tokens and the
// middleware that gates room-scoped routes on them.

pub use middleware::session_auth;
pub use service::SessionService;

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod token;
pub mod types;
