// File store adapter: blob storage behind a trait, the service composing it
// with room metadata, and the room-scoped file endpoints.

pub use service::FileService;
pub use store::{BlobStore, ByteStream};

pub mod handlers;
pub mod models;
pub mod service;
pub mod store;
