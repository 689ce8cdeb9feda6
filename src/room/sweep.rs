use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, instrument};

use super::service::RoomService;

/// Runs the background expiry sweep forever.
///
/// Each pass removes rooms past their lifespan with the full deletion
/// cascade. A failing pass is logged and the loop carries on; the next tick
/// gets another chance.
#[instrument(skip(room_service))]
pub async fn run_expiry_sweep(room_service: Arc<RoomService>, period: Duration) {
    info!(period_secs = period.as_secs(), "Starting room expiry sweep");

    let mut ticker = interval(period);
    // The first tick fires immediately; skip it so a fresh boot does not
    // sweep before serving.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        match room_service.sweep_expired().await {
            Ok(0) => debug!("Expiry sweep found nothing to do"),
            Ok(deleted_count) => info!(deleted_count, "Expiry sweep completed"),
            Err(e) => error!(error = %e, "Expiry sweep failed"),
        }
    }
}
