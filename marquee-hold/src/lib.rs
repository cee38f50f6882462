pub mod expiry;
pub mod manager;

pub use expiry::HoldSweeper;
pub use manager::{HoldConfig, HoldManager};
