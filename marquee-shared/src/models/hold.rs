use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque capability identifying one reservation hold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct HoldToken(pub Uuid);

impl HoldToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HoldToken {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for HoldToken {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for HoldToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Short-lived claim of a clerk on seats of one showtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationHold {
    pub token: HoldToken,
    pub showtime_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    /// Subject of the principal that acquired the hold
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ReservationHold {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
