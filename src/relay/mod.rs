// Ephemeral code-paired relay: a rendezvous broker that pairs one sender
// with one waiting receiver per code and streams the file between them.

pub use broker::{IncomingTransfer, RelayBroker, RelayError};

pub mod broker;
pub mod handlers;
