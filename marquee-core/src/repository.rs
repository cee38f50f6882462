use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_shared::{
    HoldToken, Order, OrderFilter, OrderStatus, ReservationHold, Seat, SeatTransition, Showtime,
};
use uuid::Uuid;

use crate::CoreResult;

/// Repository trait for showtime data access
#[async_trait]
pub trait ShowtimeRepository: Send + Sync {
    async fn create_showtime(&self, showtime: &Showtime) -> CoreResult<()>;

    async fn get_showtime(&self, id: Uuid) -> CoreResult<Option<Showtime>>;

    /// Removes the showtime and its seats.
    ///
    /// Fails with `Conflict` while any order references the showtime.
    async fn delete_showtime(&self, id: Uuid) -> CoreResult<()>;
}

/// Repository trait for seat inventory
#[async_trait]
pub trait SeatRepository: Send + Sync {
    /// Bulk insert freshly provisioned seats
    async fn insert_seats(&self, seats: &[Seat]) -> CoreResult<()>;

    async fn list_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<Seat>>;

    async fn get_seat(&self, seat_id: Uuid) -> CoreResult<Option<Seat>>;

    /// Apply `transition` to every seat in `seat_ids` or to none of them.
    ///
    /// Seats that are missing or belong to another showtime fail with
    /// `NotFound`; seats that do not match the transition fail with
    /// `SeatUnavailable` naming them.
    async fn transition_seats(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        transition: &SeatTransition,
    ) -> CoreResult<()>;
}

/// Repository trait for reservation holds
#[async_trait]
pub trait HoldRepository: Send + Sync {
    async fn insert_hold(&self, hold: &ReservationHold) -> CoreResult<()>;

    async fn get_hold(&self, token: HoldToken) -> CoreResult<Option<ReservationHold>>;

    /// Removing an unknown hold is not an error
    async fn remove_hold(&self, token: HoldToken) -> CoreResult<()>;

    async fn list_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<ReservationHold>>;
}

/// Repository trait for the order ledger
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// In one unit of work: apply `transition` to the order's seats, insert
    /// the order and insert its tickets. Nothing is written if the seat
    /// transition fails.
    async fn commit_order(&self, order: &Order, transition: &SeatTransition) -> CoreResult<()>;

    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>>;

    /// Newest first
    async fn list_orders(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>>;

    /// Compare-and-set on the status column.
    ///
    /// Fails with `InvalidTransition` if the stored status is no longer
    /// `expected`.
    async fn update_order_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> CoreResult<Order>;

    /// In one unit of work: free the seats still booked by the order, then
    /// delete the order and its tickets. Returns the freed seat ids.
    async fn delete_order(&self, id: Uuid) -> CoreResult<Vec<Uuid>>;
}
