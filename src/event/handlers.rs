use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use chrono::Utc;
use futures::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, instrument};

use crate::shared::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(60);

/// HTTP handler for the server-push subscription
///
/// GET /sse
/// Emits named `RoomsChange`/`Message` events as they are published, plus a
/// periodic `Ping` so proxies keep the connection open. The subscription ends
/// when the client disconnects.
#[instrument(name = "sse", skip(state))]
pub async fn subscribe(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_bus.subscribe();
    debug!("SSE subscriber connected");

    let stream = async_stream::stream! {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await; // immediate first tick; pings start one interval in

        loop {
            tokio::select! {
                changed = rx.recv() => match changed {
                    Ok(event) => {
                        yield Ok(Event::default()
                            .event(event.kind.to_string())
                            .data(event.payload));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Clients re-fetch on any signal, so losing events is
                        // fine; resume with the next one.
                        debug!(skipped, "SSE subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = ping.tick() => {
                    yield Ok(Event::default()
                        .event("Ping")
                        .data(Utc::now().to_rfc3339()));
                }
            }
        }
    };

    Sse::new(stream)
}
