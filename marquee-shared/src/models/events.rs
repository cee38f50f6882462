use uuid::Uuid;

use super::order::OrderStatus;
use super::seat::SeatStatus;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SeatStatusChangedEvent {
    pub showtime_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub status: SeatStatus,
    pub changed_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlacedEvent {
    pub order_id: Uuid,
    pub showtime_id: Uuid,
    pub customer_id: Option<String>,
    pub total_amount: i64,
    pub seat_count: usize,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChangedEvent {
    pub order_id: Uuid,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub timestamp: i64,
}
