use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use marquee_core::repository::{SeatRepository, ShowtimeRepository};
use marquee_core::retry::{retry_read, RetryPolicy};
use marquee_core::{CoreError, CoreResult};
use marquee_shared::{Seat, SeatTransition, Showtime};

use crate::layout::SeatLayout;

/// Authoritative seat state per showtime.
///
/// `transition_seats` is the only way seat status changes; holds, orders and
/// administration all go through it.
#[derive(Clone)]
pub struct SeatInventory {
    showtimes: Arc<dyn ShowtimeRepository>,
    seats: Arc<dyn SeatRepository>,
    retry: RetryPolicy,
}

impl SeatInventory {
    pub fn new(
        showtimes: Arc<dyn ShowtimeRepository>,
        seats: Arc<dyn SeatRepository>,
        retry: RetryPolicy,
    ) -> Self {
        Self { showtimes, seats, retry }
    }

    pub async fn create_showtime(&self, showtime: &Showtime) -> CoreResult<()> {
        if showtime.ticket_price < 0 {
            return Err(CoreError::ValidationError("ticket price must not be negative".into()));
        }
        if showtime.movie_title.trim().is_empty() {
            return Err(CoreError::ValidationError("movie title is required".into()));
        }
        self.showtimes.create_showtime(showtime).await?;
        info!("Showtime {} created: {} at {}", showtime.id, showtime.movie_title, showtime.starts_at);
        Ok(())
    }

    /// Refused while orders reference the showtime; its seats go with it
    pub async fn delete_showtime(&self, showtime_id: Uuid) -> CoreResult<()> {
        self.showtimes.delete_showtime(showtime_id).await?;
        info!("Showtime {} deleted", showtime_id);
        Ok(())
    }

    pub async fn get_showtime(&self, showtime_id: Uuid) -> CoreResult<Showtime> {
        let showtimes = &self.showtimes;
        retry_read(&self.retry, move || showtimes.get_showtime(showtime_id))
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("showtime {}", showtime_id)))
    }

    /// Seats of the showtime, row first then column
    pub async fn list_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<Seat>> {
        let seats = &self.seats;
        let mut list = retry_read(&self.retry, move || seats.list_seats(showtime_id)).await?;
        // Stores already sort; make the contract independent of the backend
        list.sort_by(|a, b| a.position().cmp(&b.position()));
        Ok(list)
    }

    pub async fn get_seat(&self, seat_id: Uuid) -> CoreResult<Seat> {
        let seats = &self.seats;
        retry_read(&self.retry, move || seats.get_seat(seat_id))
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("seat {}", seat_id)))
    }

    /// All-or-nothing status change. Never retried.
    pub async fn transition_seats(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        transition: &SeatTransition,
    ) -> CoreResult<()> {
        let ids = dedup(seat_ids);
        if ids.is_empty() {
            return Err(CoreError::ValidationError("no seats selected".into()));
        }

        self.seats.transition_seats(showtime_id, &ids, transition).await?;
        debug!(
            "Seats {} -> {} for showtime {}: {} seats",
            transition.from,
            transition.to,
            showtime_id,
            ids.len()
        );
        Ok(())
    }

    /// Create FREE seats for a showtime that has none yet
    pub async fn provision_seats(
        &self,
        showtime_id: Uuid,
        layout: &SeatLayout,
    ) -> CoreResult<Vec<Seat>> {
        let positions = layout
            .positions()
            .map_err(|e| CoreError::ValidationError(e.to_string()))?;

        self.get_showtime(showtime_id).await?;
        if !self.list_seats(showtime_id).await?.is_empty() {
            return Err(CoreError::Conflict(format!(
                "showtime {} already has seats",
                showtime_id
            )));
        }

        let seats: Vec<Seat> = positions
            .into_iter()
            .map(|position| Seat::new(showtime_id, position))
            .collect();
        self.seats.insert_seats(&seats).await?;

        info!("Provisioned {} seats for showtime {}", seats.len(), showtime_id);
        let mut sorted = seats;
        sorted.sort_by(|a, b| a.position().cmp(&b.position()));
        Ok(sorted)
    }
}

/// Keep first occurrence order, drop repeats
pub fn dedup(seat_ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    seat_ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
