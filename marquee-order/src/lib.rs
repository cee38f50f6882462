pub mod ledger;
pub mod projector;

pub use ledger::{Checkout, CreateOrder, OrderLedger};
pub use projector::{OrderView, SeatMapView, StatusProjector};
