pub mod models;
pub mod pii;

pub use models::{
    hold::{HoldToken, ReservationHold},
    order::{Order, OrderFilter, OrderStatus, PaymentMethod, Ticket},
    seat::{Seat, SeatPosition, SeatStatus, SeatTransition},
    showtime::Showtime,
};
