pub mod events;
pub mod hold;
pub mod order;
pub mod seat;
pub mod showtime;
