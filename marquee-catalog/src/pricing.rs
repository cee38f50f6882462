use marquee_core::{CoreError, CoreResult};
use marquee_shared::Showtime;

/// Flat per-seat pricing in the smallest currency unit.
///
/// No discounts, fees or taxes: the total is the showtime's ticket price
/// times the number of seats.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingPolicy;

impl PricingPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn compute_total(&self, showtime: &Showtime, seat_count: usize) -> CoreResult<i64> {
        if showtime.ticket_price < 0 {
            return Err(CoreError::ValidationError(format!(
                "showtime {} has a negative ticket price",
                showtime.id
            )));
        }
        if seat_count == 0 {
            return Err(CoreError::ValidationError("no seats to price".into()));
        }

        i64::try_from(seat_count)
            .ok()
            .and_then(|count| showtime.ticket_price.checked_mul(count))
            .ok_or_else(|| CoreError::ValidationError("order total overflows".into()))
    }

    /// Cash back for an offline sale; the tendered amount must cover the total
    pub fn change_due(&self, total: i64, tendered: i64) -> CoreResult<i64> {
        if tendered < total {
            return Err(CoreError::ValidationError(format!(
                "insufficient payment: tendered {} for a total of {}",
                tendered, total
            )));
        }
        Ok(tendered - total)
    }
}
