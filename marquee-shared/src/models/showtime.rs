use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduled screening with a flat per-seat price.
///
/// Movie, theater and room are owned by the catalog; only the names needed
/// for receipts and seat maps are kept here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Showtime {
    pub id: Uuid,
    pub movie_title: String,
    pub theater_name: String,
    pub room_name: String,
    pub starts_at: DateTime<Utc>,
    /// Smallest currency unit
    pub ticket_price: i64,
}
