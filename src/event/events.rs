use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::Display;

/// What changed. The name doubles as the SSE event name, so clients can
/// register listeners per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum ChangeKind {
    RoomsChange,
    Message,
}

/// A lightweight invalidation signal pushed to connected clients.
///
/// Events are facts about things that already happened. Clients treat every
/// `RoomsChange` as "re-fetch the room list" rather than as a delta, so
/// delivery is best-effort and dropped events are harmless.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn rooms_change(payload: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::RoomsChange,
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }
}
