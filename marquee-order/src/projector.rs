use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use marquee_catalog::SeatInventory;
use marquee_core::CoreResult;
use marquee_shared::pii::Masked;
use marquee_shared::{Order, OrderFilter, OrderStatus, PaymentMethod, SeatStatus, Showtime, Ticket};

use crate::ledger::OrderLedger;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    pub seat_id: Uuid,
    pub name: String,
    pub column: u32,
    pub status: SeatStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatRowView {
    pub row: String,
    pub seats: Vec<SeatView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMapView {
    pub showtime: Showtime,
    pub rows: Vec<SeatRowView>,
    pub free: usize,
    pub held: usize,
    pub booked: usize,
}

/// Order joined with what a receipt needs to show
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: Uuid,
    pub showtime_id: Uuid,
    pub movie_title: String,
    pub theater_name: String,
    pub room_name: String,
    pub starts_at: DateTime<Utc>,
    pub customer_id: Option<String>,
    pub customer_name: Option<Masked<String>>,
    pub clerk_id: String,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub total_amount: i64,
    pub seat_names: Vec<String>,
    pub tickets: Vec<Ticket>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderView {
    fn new(order: Order, showtime: &Showtime) -> Self {
        Self {
            order_id: order.id,
            showtime_id: order.showtime_id,
            movie_title: showtime.movie_title.clone(),
            theater_name: showtime.theater_name.clone(),
            room_name: showtime.room_name.clone(),
            starts_at: showtime.starts_at,
            customer_id: order.customer_id,
            customer_name: order.customer_name,
            clerk_id: order.clerk_id,
            payment_method: order.payment_method,
            status: order.status,
            total_amount: order.total_amount,
            seat_names: order.tickets.iter().map(|t| t.seat_name.clone()).collect(),
            tickets: order.tickets,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Read-only projections over inventory and ledger
#[derive(Clone)]
pub struct StatusProjector {
    inventory: SeatInventory,
    ledger: OrderLedger,
}

impl StatusProjector {
    pub fn new(inventory: SeatInventory, ledger: OrderLedger) -> Self {
        Self { inventory, ledger }
    }

    pub async fn seat_map(&self, showtime_id: Uuid) -> CoreResult<SeatMapView> {
        let showtime = self.inventory.get_showtime(showtime_id).await?;
        let seats = self.inventory.list_seats(showtime_id).await?;

        let (mut free, mut held, mut booked) = (0, 0, 0);
        let mut rows: Vec<SeatRowView> = Vec::new();

        // seats arrive sorted, so each row is one contiguous run
        for seat in seats {
            match seat.status {
                SeatStatus::Free => free += 1,
                SeatStatus::Held => held += 1,
                SeatStatus::Booked => booked += 1,
            }
            let view = SeatView {
                seat_id: seat.id,
                name: seat.name(),
                column: seat.column,
                status: seat.status,
            };
            match rows.last_mut() {
                Some(row) if row.row == seat.row => row.seats.push(view),
                _ => rows.push(SeatRowView { row: seat.row, seats: vec![view] }),
            }
        }

        Ok(SeatMapView { showtime, rows, free, held, booked })
    }

    pub async fn order_view(&self, order_id: Uuid) -> CoreResult<OrderView> {
        let order = self.ledger.get_order(order_id).await?;
        let showtime = self.inventory.get_showtime(order.showtime_id).await?;
        Ok(OrderView::new(order, &showtime))
    }

    pub async fn order_views(&self, filter: &OrderFilter) -> CoreResult<Vec<OrderView>> {
        let orders = self.ledger.list_orders(filter).await?;
        let mut showtimes: HashMap<Uuid, Showtime> = HashMap::new();
        let mut views = Vec::with_capacity(orders.len());

        for order in orders {
            if !showtimes.contains_key(&order.showtime_id) {
                let showtime = self.inventory.get_showtime(order.showtime_id).await?;
                showtimes.insert(order.showtime_id, showtime);
            }
            if let Some(showtime) = showtimes.get(&order.showtime_id) {
                views.push(OrderView::new(order, showtime));
            }
        }
        Ok(views)
    }
}
