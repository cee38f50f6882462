use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use marquee_core::repository::OrderRepository;
use marquee_core::{CoreError, CoreResult};
use marquee_shared::pii::Masked;
use marquee_shared::{Order, OrderFilter, OrderStatus, SeatTransition, Ticket};

use crate::database::map_sqlx_error;
use crate::seat_repo::transition_in_tx;

pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    showtime_id: Uuid,
    customer_id: Option<String>,
    customer_name: Option<String>,
    clerk_id: String,
    payment_method: String,
    status: String,
    total_amount: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    order_id: Uuid,
    seat_id: Uuid,
    seat_name: String,
    created_at: DateTime<Utc>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Ticket {
            id: row.id,
            order_id: row.order_id,
            seat_id: row.seat_id,
            seat_name: row.seat_name,
            created_at: row.created_at,
        }
    }
}

impl OrderRow {
    fn into_order(self, tickets: Vec<Ticket>) -> CoreResult<Order> {
        Ok(Order {
            id: self.id,
            showtime_id: self.showtime_id,
            customer_id: self.customer_id,
            customer_name: self.customer_name.map(Masked),
            clerk_id: self.clerk_id,
            payment_method: self.payment_method.parse().map_err(CoreError::InternalError)?,
            status: self.status.parse().map_err(CoreError::InternalError)?,
            total_amount: self.total_amount,
            tickets,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, showtime_id, customer_id, customer_name, clerk_id, payment_method, status, total_amount, created_at, updated_at";

async fn fetch_tickets(
    conn: &mut PgConnection,
    order_ids: &[Uuid],
) -> CoreResult<HashMap<Uuid, Vec<Ticket>>> {
    let rows: Vec<TicketRow> = sqlx::query_as(
        r#"
        SELECT t.id, t.order_id, t.seat_id, t.seat_name, t.created_at
        FROM tickets t
        LEFT JOIN seats s ON s.id = t.seat_id
        WHERE t.order_id = ANY($1)
        ORDER BY s.seat_row COLLATE "C", s.seat_column, t.seat_name
        "#,
    )
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    let mut by_order: HashMap<Uuid, Vec<Ticket>> = HashMap::new();
    for row in rows {
        by_order.entry(row.order_id).or_default().push(Ticket::from(row));
    }
    Ok(by_order)
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn commit_order(&self, order: &Order, transition: &SeatTransition) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // 1. Seats first: if the race was lost nothing else is written
        transition_in_tx(&mut *tx, order.showtime_id, &order.seat_ids(), transition).await?;

        // 2. Order row
        sqlx::query(
            r#"
            INSERT INTO orders (id, showtime_id, customer_id, customer_name, clerk_id, payment_method, status, total_amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id)
        .bind(order.showtime_id)
        .bind(order.customer_id.as_deref())
        .bind(order.customer_name.as_ref().map(|n| n.expose().as_str()))
        .bind(&order.clerk_id)
        .bind(order.payment_method.as_str())
        .bind(order.status.as_str())
        .bind(order.total_amount)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        // 3. One ticket per seat
        for ticket in &order.tickets {
            sqlx::query(
                r#"
                INSERT INTO tickets (id, order_id, seat_id, seat_name, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(ticket.id)
            .bind(ticket.order_id)
            .bind(ticket.seat_id)
            .bind(&ticket.seat_name)
            .bind(ticket.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;

        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let mut tickets = fetch_tickets(&mut conn, &[id]).await?;
                let tickets = tickets.remove(&id).unwrap_or_default();
                row.into_order(tickets).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn list_orders(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>> {
        if !filter.all && filter.customer_id.is_none() {
            return Ok(Vec::new());
        }
        let customer_id = if filter.all { None } else { filter.customer_id.as_deref() };

        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;

        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM orders
            WHERE ($1::text IS NULL OR customer_id = $1)
              AND ($2::uuid IS NULL OR showtime_id = $2)
            ORDER BY created_at DESC
            "#,
            ORDER_COLUMNS
        ))
        .bind(customer_id)
        .bind(filter.showtime_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut tickets = fetch_tickets(&mut conn, &ids).await?;

        rows.into_iter()
            .map(|row| {
                let order_tickets = tickets.remove(&row.id).unwrap_or_default();
                row.into_order(order_tickets)
            })
            .collect()
    }

    async fn update_order_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> CoreResult<Order> {
        let updated: Option<Uuid> = sqlx::query_scalar(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3 RETURNING id",
        )
        .bind(status.as_str())
        .bind(id)
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let order = self
            .get_order(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", id)))?;

        if updated.is_none() {
            return Err(CoreError::InvalidTransition {
                from: order.status.to_string(),
                to: status.to_string(),
            });
        }
        Ok(order)
    }

    async fn delete_order(&self, id: Uuid) -> CoreResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if exists.is_none() {
            return Err(CoreError::NotFound(format!("order {}", id)));
        }

        let released: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE seats
            SET status = 'FREE', holder = NULL, version = version + 1
            WHERE holder = $1 AND status = 'BOOKED'
            RETURNING id
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM tickets WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(released)
    }
}
