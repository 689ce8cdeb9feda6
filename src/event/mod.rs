// Change-notification infrastructure: the in-process bus plus the SSE
// endpoint that relays it to connected clients.

pub use bus::EventBus;
pub use events::{ChangeEvent, ChangeKind};

mod bus;
mod events;
pub mod handlers;
