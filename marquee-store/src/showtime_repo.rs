use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use marquee_core::repository::ShowtimeRepository;
use marquee_core::{CoreError, CoreResult};
use marquee_shared::Showtime;

use crate::database::map_sqlx_error;

pub struct StoreShowtimeRepository {
    pool: PgPool,
}

impl StoreShowtimeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ShowtimeRow {
    id: Uuid,
    movie_title: String,
    theater_name: String,
    room_name: String,
    starts_at: DateTime<Utc>,
    ticket_price: i64,
}

impl From<ShowtimeRow> for Showtime {
    fn from(row: ShowtimeRow) -> Self {
        Showtime {
            id: row.id,
            movie_title: row.movie_title,
            theater_name: row.theater_name,
            room_name: row.room_name,
            starts_at: row.starts_at,
            ticket_price: row.ticket_price,
        }
    }
}

#[async_trait]
impl ShowtimeRepository for StoreShowtimeRepository {
    async fn create_showtime(&self, showtime: &Showtime) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO showtimes (id, movie_title, theater_name, room_name, starts_at, ticket_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(showtime.id)
        .bind(&showtime.movie_title)
        .bind(&showtime.theater_name)
        .bind(&showtime.room_name)
        .bind(showtime.starts_at)
        .bind(showtime.ticket_price)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_showtime(&self, id: Uuid) -> CoreResult<Option<Showtime>> {
        let row: Option<ShowtimeRow> = sqlx::query_as(
            "SELECT id, movie_title, theater_name, room_name, starts_at, ticket_price FROM showtimes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Showtime::from))
    }

    async fn delete_showtime(&self, id: Uuid) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM showtimes WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        if exists.is_none() {
            return Err(CoreError::NotFound(format!("showtime {}", id)));
        }

        let referenced: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE showtime_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if referenced > 0 {
            return Err(CoreError::Conflict(format!(
                "showtime {} is referenced by {} orders",
                id, referenced
            )));
        }

        sqlx::query("DELETE FROM seats WHERE showtime_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM showtimes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
