use std::sync::Arc;
use std::time::Duration;

use marquee_hold::{HoldManager, HoldSweeper};
use tokio::task::JoinHandle;

use crate::metrics::Metrics;

/// Periodically release expired holds and count them.
pub fn start_hold_sweeper(
    holds: HoldManager,
    interval: Duration,
    metrics: Arc<Metrics>,
) -> JoinHandle<()> {
    HoldSweeper::new(holds, interval).spawn(move |swept| {
        if swept > 0 {
            metrics.holds_expired.inc_by(swept as u64);
        }
    })
}
