use std::sync::Arc;

use marquee_catalog::SeatInventory;
use marquee_core::events::EventPublisher;
use marquee_core::repository::{HoldRepository, OrderRepository, SeatRepository, ShowtimeRepository};
use marquee_core::retry::RetryPolicy;
use marquee_hold::{HoldConfig, HoldManager};
use marquee_order::{OrderLedger, StatusProjector};
use marquee_store::{BroadcastPublisher, FanoutPublisher, MemoryStore};

use crate::metrics::Metrics;

const SEAT_STREAM_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// Storage backends behind the services
#[derive(Clone)]
pub struct Repositories {
    pub showtimes: Arc<dyn ShowtimeRepository>,
    pub seats: Arc<dyn SeatRepository>,
    pub holds: Arc<dyn HoldRepository>,
    pub orders: Arc<dyn OrderRepository>,
}

impl Repositories {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            showtimes: store.clone(),
            seats: store.clone(),
            holds: store.clone(),
            orders: store,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub inventory: SeatInventory,
    pub holds: HoldManager,
    pub ledger: OrderLedger,
    pub projector: StatusProjector,
    pub seat_events: BroadcastPublisher,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
}

impl AppState {
    /// Wire the services; `publishers` receive every domain event in
    /// addition to the live seat stream.
    pub fn new(
        repos: Repositories,
        publishers: Vec<Arc<dyn EventPublisher>>,
        hold_config: HoldConfig,
        retry: RetryPolicy,
        auth: AuthConfig,
    ) -> Result<Self, prometheus::Error> {
        let seat_events = BroadcastPublisher::new(SEAT_STREAM_CAPACITY);
        let mut sinks: Vec<Arc<dyn EventPublisher>> = vec![Arc::new(seat_events.clone())];
        sinks.extend(publishers);
        let events: Arc<dyn EventPublisher> = Arc::new(FanoutPublisher::new(sinks));

        let inventory = SeatInventory::new(repos.showtimes, repos.seats, retry);
        let holds = HoldManager::new(inventory.clone(), repos.holds, events.clone(), hold_config);
        let ledger = OrderLedger::new(inventory.clone(), holds.clone(), repos.orders, events, retry);
        let projector = StatusProjector::new(inventory.clone(), ledger.clone());

        Ok(Self {
            inventory,
            holds,
            ledger,
            projector,
            seat_events,
            metrics: Arc::new(Metrics::new()?),
            auth,
        })
    }
}
