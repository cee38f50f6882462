use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::pii::Masked;

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// PENDING -> PAID, PENDING -> CANCELLED, PAID -> CANCELLED
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Paid, OrderStatus::Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAID" => Ok(OrderStatus::Paid),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Paid at the counter, settled immediately
    Offline,
    /// Awaiting confirmation from an external gateway
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Offline => "offline",
            PaymentMethod::Online => "online",
        }
    }

    pub fn initial_status(&self) -> OrderStatus {
        match self {
            PaymentMethod::Offline => OrderStatus::Paid,
            PaymentMethod::Online => OrderStatus::Pending,
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "offline" => Ok(PaymentMethod::Offline),
            "online" => Ok(PaymentMethod::Online),
            other => Err(format!("unknown payment method: {}", other)),
        }
    }
}

/// Finalized purchase of seats for one showtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub showtime_id: Uuid,
    pub customer_id: Option<String>,
    pub customer_name: Option<Masked<String>>,
    /// Subject of the principal that rang up the sale
    pub clerk_id: String,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub total_amount: i64,
    pub tickets: Vec<Ticket>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn seat_ids(&self) -> Vec<Uuid> {
        self.tickets.iter().map(|t| t.seat_id).collect()
    }

    /// Update order status
    pub fn update_status(&mut self, new_status: OrderStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }
}

/// One admitted seat within an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub order_id: Uuid,
    pub seat_id: Uuid,
    pub seat_name: String,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn new(order_id: Uuid, seat_id: Uuid, seat_name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            seat_id,
            seat_name,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    pub customer_id: Option<String>,
    pub showtime_id: Option<Uuid>,
    /// Ignore `customer_id` and return every order
    pub all: bool,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(showtime_id) = self.showtime_id {
            if order.showtime_id != showtime_id {
                return false;
            }
        }
        if self.all {
            return true;
        }
        match &self.customer_id {
            Some(customer_id) => order.customer_id.as_deref() == Some(customer_id.as_str()),
            None => false,
        }
    }
}
