pub mod app_config;
pub mod database;
pub mod events;
pub mod memory;
pub mod order_repo;
pub mod redis_repo;
pub mod seat_repo;
pub mod showtime_repo;

pub use database::DbClient;
pub use events::{BroadcastPublisher, FanoutPublisher};
#[cfg(feature = "kafka")]
pub use events::KafkaPublisher;
pub use memory::MemoryStore;
pub use order_repo::StoreOrderRepository;
pub use redis_repo::RedisClient;
pub use seat_repo::StoreSeatRepository;
pub use showtime_repo::StoreShowtimeRepository;
