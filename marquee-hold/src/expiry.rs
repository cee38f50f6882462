use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::manager::HoldManager;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Background task that returns expired holds' seats to the pool
pub struct HoldSweeper {
    manager: HoldManager,
    interval: Duration,
}

impl HoldSweeper {
    /// A zero interval is raised to `MIN_INTERVAL`; tokio rejects it.
    pub fn new(manager: HoldManager, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("Hold sweep interval of zero raised to {:?}", MIN_INTERVAL);
            MIN_INTERVAL
        } else {
            interval
        };
        Self { manager, interval }
    }

    /// One pass; errors are logged and the next tick tries again
    pub async fn run_once(&self) -> usize {
        match self.manager.sweep_expired(Utc::now()).await {
            Ok(swept) => swept,
            Err(e) => {
                error!("Hold sweep failed: {}", e);
                0
            }
        }
    }

    /// Sweep forever; `on_sweep` receives the number of holds released per pass
    pub fn spawn<F>(self, mut on_sweep: F) -> JoinHandle<()>
    where
        F: FnMut(usize) + Send + 'static,
    {
        tokio::spawn(async move {
            info!("Hold sweeper started, interval {:?}", self.interval);
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let swept = self.run_once().await;
                on_sweep(swept);
            }
        })
    }
}
