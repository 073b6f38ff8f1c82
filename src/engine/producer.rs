//! Producer loop: lease items for one worker type into the handoff buffer.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::Inner;

pub(super) async fn run(engine: Arc<Inner>, worker_type: String, cancel: CancellationToken) {
    info!(worker_type = %worker_type, "producer started");

    loop {
        let leased = tokio::select! {
            _ = cancel.cancelled() => break,
            leased = engine.queue.lease_next(&worker_type) => leased,
        };

        let item = match leased {
            Ok(Some(item)) => item,
            Ok(None) => {
                trace!(worker_type = %worker_type, "no item available");
                if idle(&engine, &cancel).await {
                    break;
                }
                continue;
            }
            Err(e) => {
                error!(worker_type = %worker_type, "lease failed: {e}");
                engine
                    .events
                    .error(format!("lease for {worker_type} failed: {e}"));
                if idle(&engine, &cancel).await {
                    break;
                }
                continue;
            }
        };

        // Blocks while the buffer is full; this is where backpressure lands.
        let permit = tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = engine.queue.release(&item).await {
                    debug!(key = %item.key, "release on shutdown failed: {e}");
                }
                break;
            }
            permit = engine.handoff_tx.reserve() => permit,
        };
        match permit {
            Ok(permit) => {
                debug!(key = %item.key, worker_type = %worker_type, "item handed off");
                permit.send(item);
            }
            Err(_) => break,
        }
    }

    info!(worker_type = %worker_type, "producer stopped");
}

/// Wait out the idle back-off. Returns true if cancelled meanwhile.
async fn idle(engine: &Inner, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(engine.config.idle_poll) => false,
    }
}
