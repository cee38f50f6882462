use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use marquee_shared::SeatPosition;

/// Highest column number a room can have
pub const MAX_COLUMN: u32 = 999;

/// Room template: every row is combined with every column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatLayout {
    pub rows: Vec<String>,
    pub columns: Vec<u32>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Layout has no rows or no columns")]
    Empty,

    #[error("Invalid row label: {0:?}")]
    InvalidRow(String),

    #[error("Column numbers start at 1")]
    ZeroColumn,

    #[error("Column {0} is above {max}", max = MAX_COLUMN)]
    ColumnTooLarge(u32),

    #[error("Duplicate seat {0}")]
    Duplicate(String),
}

impl SeatLayout {
    pub fn new(rows: Vec<String>, columns: Vec<u32>) -> Self {
        Self { rows, columns }
    }

    /// Rows `A`, `B`, ... and columns `1..=columns`
    pub fn grid(rows: u8, columns: u32) -> Self {
        let rows = (b'A'..b'A'.saturating_add(rows.min(26)))
            .map(|c| (c as char).to_string())
            .collect();
        Self::new(rows, (1..=columns).collect())
    }

    /// Validate and expand into seat positions, rows in input order.
    pub fn positions(&self) -> Result<Vec<SeatPosition>, LayoutError> {
        if self.rows.is_empty() || self.columns.is_empty() {
            return Err(LayoutError::Empty);
        }
        if self.columns.contains(&0) {
            return Err(LayoutError::ZeroColumn);
        }
        if let Some(&column) = self.columns.iter().find(|&&c| c > MAX_COLUMN) {
            return Err(LayoutError::ColumnTooLarge(column));
        }

        let mut seen = HashSet::new();
        let mut positions = Vec::with_capacity(self.rows.len() * self.columns.len());

        for raw in &self.rows {
            let row = raw.trim();
            if row.is_empty() || !row.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(LayoutError::InvalidRow(raw.clone()));
            }
            let row = row.to_ascii_uppercase();

            for &column in &self.columns {
                let position = SeatPosition::new(row.clone(), column);
                if !seen.insert(position.clone()) {
                    return Err(LayoutError::Duplicate(position.name()));
                }
                positions.push(position);
            }
        }

        Ok(positions)
    }
}
