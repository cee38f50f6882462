use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use marquee_core::repository::{
    HoldRepository, OrderRepository, SeatRepository, ShowtimeRepository,
};
use marquee_core::{CoreError, CoreResult};
use marquee_shared::{
    HoldToken, Order, OrderFilter, OrderStatus, ReservationHold, Seat, SeatTransition, Showtime,
};

#[derive(Default)]
struct State {
    showtimes: HashMap<Uuid, Showtime>,
    seats: HashMap<Uuid, Seat>,
    orders: HashMap<Uuid, Order>,
    holds: HashMap<HoldToken, ReservationHold>,
}

impl State {
    fn check_transition(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        transition: &SeatTransition,
    ) -> CoreResult<()> {
        let mut missing = Vec::new();
        let mut unavailable = Vec::new();

        for id in seat_ids {
            match self.seats.get(id) {
                Some(seat) if seat.showtime_id == showtime_id => {
                    if !transition.matches(seat) && !unavailable.contains(id) {
                        unavailable.push(*id);
                    }
                }
                _ => missing.push(*id),
            }
        }

        if !missing.is_empty() {
            return Err(CoreError::NotFound(format!(
                "seats {:?} in showtime {}",
                missing, showtime_id
            )));
        }
        if !unavailable.is_empty() {
            return Err(CoreError::SeatUnavailable { seat_ids: unavailable });
        }
        Ok(())
    }

    /// Check every seat first, then apply; nothing changes on failure
    fn apply_transition(
        &mut self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        transition: &SeatTransition,
    ) -> CoreResult<()> {
        self.check_transition(showtime_id, seat_ids, transition)?;

        let mut seen = HashSet::new();
        for id in seat_ids {
            if !seen.insert(*id) {
                continue;
            }
            if let Some(seat) = self.seats.get_mut(id) {
                transition.apply(seat);
            }
        }
        Ok(())
    }
}

/// Process-local store backing every repository trait.
///
/// All mutations take the single write lock, so every check-then-apply
/// sequence is atomic with respect to concurrent callers.
///
/// Development and test backend only: the lock spans every showtime. The
/// Postgres store locks only the seat rows a transition touches.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShowtimeRepository for MemoryStore {
    async fn create_showtime(&self, showtime: &Showtime) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if state.showtimes.contains_key(&showtime.id) {
            return Err(CoreError::Conflict(format!(
                "showtime {} already exists",
                showtime.id
            )));
        }
        state.showtimes.insert(showtime.id, showtime.clone());
        Ok(())
    }

    async fn get_showtime(&self, id: Uuid) -> CoreResult<Option<Showtime>> {
        Ok(self.state.read().await.showtimes.get(&id).cloned())
    }

    async fn delete_showtime(&self, id: Uuid) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if !state.showtimes.contains_key(&id) {
            return Err(CoreError::NotFound(format!("showtime {}", id)));
        }
        if state.orders.values().any(|o| o.showtime_id == id) {
            return Err(CoreError::Conflict(format!(
                "showtime {} is referenced by orders",
                id
            )));
        }

        state.seats.retain(|_, seat| seat.showtime_id != id);
        state.holds.retain(|_, hold| hold.showtime_id != id);
        state.showtimes.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl SeatRepository for MemoryStore {
    async fn insert_seats(&self, seats: &[Seat]) -> CoreResult<()> {
        let mut state = self.state.write().await;

        let mut taken: HashSet<(Uuid, String, u32)> = state
            .seats
            .values()
            .map(|s| (s.showtime_id, s.row.clone(), s.column))
            .collect();

        for seat in seats {
            if !state.showtimes.contains_key(&seat.showtime_id) {
                return Err(CoreError::NotFound(format!("showtime {}", seat.showtime_id)));
            }
            if !taken.insert((seat.showtime_id, seat.row.clone(), seat.column)) {
                return Err(CoreError::Conflict(format!(
                    "seat {} already exists in showtime {}",
                    seat.name(),
                    seat.showtime_id
                )));
            }
        }

        for seat in seats {
            state.seats.insert(seat.id, seat.clone());
        }
        Ok(())
    }

    async fn list_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<Seat>> {
        let state = self.state.read().await;
        let mut seats: Vec<Seat> = state
            .seats
            .values()
            .filter(|s| s.showtime_id == showtime_id)
            .cloned()
            .collect();
        seats.sort_by(|a, b| a.position().cmp(&b.position()));
        Ok(seats)
    }

    async fn get_seat(&self, seat_id: Uuid) -> CoreResult<Option<Seat>> {
        Ok(self.state.read().await.seats.get(&seat_id).cloned())
    }

    async fn transition_seats(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        transition: &SeatTransition,
    ) -> CoreResult<()> {
        self.state
            .write()
            .await
            .apply_transition(showtime_id, seat_ids, transition)
    }
}

#[async_trait]
impl HoldRepository for MemoryStore {
    async fn insert_hold(&self, hold: &ReservationHold) -> CoreResult<()> {
        self.state.write().await.holds.insert(hold.token, hold.clone());
        Ok(())
    }

    async fn get_hold(&self, token: HoldToken) -> CoreResult<Option<ReservationHold>> {
        Ok(self.state.read().await.holds.get(&token).cloned())
    }

    async fn remove_hold(&self, token: HoldToken) -> CoreResult<()> {
        self.state.write().await.holds.remove(&token);
        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<ReservationHold>> {
        let state = self.state.read().await;
        Ok(state
            .holds
            .values()
            .filter(|h| h.is_expired(now))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn commit_order(&self, order: &Order, transition: &SeatTransition) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id) {
            return Err(CoreError::Conflict(format!("order {} already exists", order.id)));
        }

        state.apply_transition(order.showtime_id, &order.seat_ids(), transition)?;
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> CoreResult<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("order {}", id)))?;

        if order.status != expected {
            return Err(CoreError::InvalidTransition {
                from: order.status.to_string(),
                to: status.to_string(),
            });
        }

        order.update_status(status);
        Ok(order.clone())
    }

    async fn delete_order(&self, id: Uuid) -> CoreResult<Vec<Uuid>> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .remove(&id)
            .ok_or_else(|| CoreError::NotFound(format!("order {}", id)))?;

        let unbook = SeatTransition::unbook(order.id);
        let mut released = Vec::new();
        for seat_id in order.seat_ids() {
            if let Some(seat) = state.seats.get_mut(&seat_id) {
                if unbook.matches(seat) {
                    unbook.apply(seat);
                    released.push(seat_id);
                }
            }
        }
        Ok(released)
    }
}
