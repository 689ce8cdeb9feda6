use tokio::sync::broadcast;
use tracing::debug;

use super::events::ChangeEvent;

/// Fan-out bus for change notifications.
///
/// Built on a broadcast channel: `publish` never blocks the publisher, a slow
/// subscriber lags and loses events in its own channel without back-pressuring
/// anyone else, and delivery is at-most-once.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    /// Creates a bus whose per-subscriber buffer holds `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emits an event to every current subscriber. A bus with no subscribers
    /// swallows the event.
    pub fn publish(&self, event: ChangeEvent) {
        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(receivers = receiver_count, "Change event published");
            }
            Err(_) => {
                debug!("Change event published with no subscribers");
            }
        }
    }

    /// Registers a new subscriber. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
