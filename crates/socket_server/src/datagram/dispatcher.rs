//! On-demand batch sends for the datagram transport.

use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{broadcast, PeerRegistry};
use crate::error::ServerError;
use crate::listener::DatagramListener;
use crate::transport::pause;

/// Largest batch a single request may ask for.
pub const MAX_BATCH_COUNT: usize = 100;

/// Totals for one batch.
///
/// `sent_count` counts successful per-peer deliveries. `failed_count` counts
/// failed per-peer deliveries plus one for every message that found the
/// registry empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub sent_count: usize,
    pub failed_count: usize,
}

/// Checks that `count` lies in `1..=MAX_BATCH_COUNT`.
pub fn validate_count(count: usize) -> Result<(), ServerError> {
    if (1..=MAX_BATCH_COUNT).contains(&count) {
        Ok(())
    } else {
        Err(ServerError::InvalidCount {
            count,
            max: MAX_BATCH_COUNT,
        })
    }
}

/// Text of the `index`-th message of a batch of `count`.
pub fn numbered_message(index: usize, count: usize, message: &str) -> String {
    format!("[{index}/{count}] {message}")
}

/// Sends `count` numbered copies of `message` to every registered peer,
/// pausing `interval` after each delivered round.
///
/// The batch stops early, keeping the totals so far, if `cancel` fires.
pub async fn send_batch(
    socket: &DatagramListener,
    registry: &PeerRegistry,
    count: usize,
    message: &str,
    interval: Duration,
    cancel: &CancellationToken,
) -> BatchReport {
    let mut report = BatchReport::default();
    info!(count, "Sending message batch to all peers");

    for index in 1..=count {
        let numbered = numbered_message(index, count, message);

        let Some(delivery) = broadcast(socket, registry, numbered.as_bytes(), cancel).await else {
            warn!(index, count, "Batch interrupted by shutdown");
            break;
        };

        if delivery.peers == 0 {
            warn!(index, "No registered peers for batch message");
            report.failed_count += 1;
            continue;
        }

        report.sent_count += delivery.delivered;
        report.failed_count += delivery.failed;
        info!(index, count, delivered = delivery.delivered, "Sent batch message");

        if !pause(cancel, interval).await {
            warn!(index, count, "Batch interrupted by shutdown");
            break;
        }
    }

    info!(
        sent = report.sent_count,
        failed = report.failed_count,
        "Batch finished"
    );
    report
}
