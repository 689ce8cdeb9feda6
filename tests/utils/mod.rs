pub mod http;
pub mod setup;

pub use http::*;
pub use setup::*;
