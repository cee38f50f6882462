pub mod inventory;
pub mod layout;
pub mod pricing;

pub use inventory::SeatInventory;
pub use layout::{LayoutError, SeatLayout};
pub use pricing::PricingPolicy;
