use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::hold::HoldToken;

/// Seat status within a showtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Free,
    Held,
    Booked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Free => "FREE",
            SeatStatus::Held => "HELD",
            SeatStatus::Booked => "BOOKED",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FREE" => Ok(SeatStatus::Free),
            "HELD" => Ok(SeatStatus::Held),
            "BOOKED" => Ok(SeatStatus::Booked),
            other => Err(format!("unknown seat status: {}", other)),
        }
    }
}

/// Row/column coordinate of a seat.
///
/// Ordering is row first (lexicographic), then column (numeric), so `A2`
/// sorts before `A10`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeatPosition {
    pub row: String,
    pub column: u32,
}

impl SeatPosition {
    pub fn new(row: impl Into<String>, column: u32) -> Self {
        Self { row: row.into(), column }
    }

    /// Split a display name such as `"B12"` into its row and column.
    ///
    /// Only meant for layout input; stored seats keep row and column as fields.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        let split = name.find(|c: char| c.is_ascii_digit())?;
        let (row, column) = name.split_at(split);

        if row.is_empty() || !row.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        let column: u32 = column.parse().ok()?;
        if column == 0 {
            return None;
        }

        Some(Self::new(row.to_ascii_uppercase(), column))
    }

    pub fn name(&self) -> String {
        format!("{}{}", self.row, self.column)
    }
}

/// A bookable seat of one showtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Seat {
    pub id: Uuid,
    pub showtime_id: Uuid,
    pub row: String,
    pub column: u32,
    pub status: SeatStatus,
    /// Hold token while HELD, order id while BOOKED
    pub holder: Option<Uuid>,
    pub version: i64,
}

impl Seat {
    pub fn new(showtime_id: Uuid, position: SeatPosition) -> Self {
        Self {
            id: Uuid::new_v4(),
            showtime_id,
            row: position.row,
            column: position.column,
            status: SeatStatus::Free,
            holder: None,
            version: 0,
        }
    }

    pub fn name(&self) -> String {
        format!("{}{}", self.row, self.column)
    }

    pub fn position(&self) -> SeatPosition {
        SeatPosition::new(self.row.clone(), self.column)
    }
}

/// Conditional status change applied to a batch of seats.
///
/// A seat matches when its status equals `from` and, if `expected_holder` is
/// set, its holder equals it. Stores apply a transition to all seats or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatTransition {
    pub from: SeatStatus,
    pub to: SeatStatus,
    pub expected_holder: Option<Uuid>,
    pub new_holder: Option<Uuid>,
}

impl SeatTransition {
    pub fn new(from: SeatStatus, to: SeatStatus) -> Self {
        Self {
            from,
            to,
            expected_holder: None,
            new_holder: None,
        }
    }

    /// FREE -> HELD, claimed by the hold
    pub fn hold(token: HoldToken) -> Self {
        Self {
            new_holder: Some(token.0),
            ..Self::new(SeatStatus::Free, SeatStatus::Held)
        }
    }

    /// HELD -> FREE, only while still claimed by the hold
    pub fn release(token: HoldToken) -> Self {
        Self {
            expected_holder: Some(token.0),
            ..Self::new(SeatStatus::Held, SeatStatus::Free)
        }
    }

    /// HELD -> BOOKED, handing the claim from the hold to the order
    pub fn book(token: HoldToken, order_id: Uuid) -> Self {
        Self {
            expected_holder: Some(token.0),
            new_holder: Some(order_id),
            ..Self::new(SeatStatus::Held, SeatStatus::Booked)
        }
    }

    /// BOOKED -> FREE, only for seats booked by the order
    pub fn unbook(order_id: Uuid) -> Self {
        Self {
            expected_holder: Some(order_id),
            ..Self::new(SeatStatus::Booked, SeatStatus::Free)
        }
    }

    pub fn matches(&self, seat: &Seat) -> bool {
        seat.status == self.from
            && self
                .expected_holder
                .map_or(true, |holder| seat.holder == Some(holder))
    }

    pub fn apply(&self, seat: &mut Seat) {
        seat.status = self.to;
        seat.holder = self.new_holder;
        seat.version += 1;
    }
}
