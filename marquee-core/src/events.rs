use async_trait::async_trait;
use chrono::Utc;
use marquee_shared::models::events::{
    OrderPlacedEvent, OrderStatusChangedEvent, SeatStatusChangedEvent,
};
use marquee_shared::SeatStatus;
use serde::Serialize;
use uuid::Uuid;

pub const SEATS_TOPIC: &str = "seats.changed";
pub const ORDERS_TOPIC: &str = "orders.events";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum DomainEvent {
    SeatsChanged(SeatStatusChangedEvent),
    OrderPlaced(OrderPlacedEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
}

impl DomainEvent {
    pub fn seats_changed(showtime_id: Uuid, seat_ids: Vec<Uuid>, status: SeatStatus) -> Self {
        DomainEvent::SeatsChanged(SeatStatusChangedEvent {
            showtime_id,
            seat_ids,
            status,
            changed_at: Utc::now().timestamp(),
        })
    }

    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::SeatsChanged(_) => SEATS_TOPIC,
            DomainEvent::OrderPlaced(_) | DomainEvent::OrderStatusChanged(_) => ORDERS_TOPIC,
        }
    }

    /// Partition key: seat events by showtime, order events by order
    pub fn key(&self) -> String {
        match self {
            DomainEvent::SeatsChanged(e) => e.showtime_id.to_string(),
            DomainEvent::OrderPlaced(e) => e.order_id.to_string(),
            DomainEvent::OrderStatusChanged(e) => e.order_id.to_string(),
        }
    }
}

/// Fire-and-forget sink for domain events; implementations log their own
/// delivery failures.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent);
}

pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, event: DomainEvent) {
        tracing::trace!("Dropping event for {}", event.topic());
    }
}
