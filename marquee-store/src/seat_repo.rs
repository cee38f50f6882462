use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use std::collections::HashSet;
use uuid::Uuid;

use marquee_core::repository::SeatRepository;
use marquee_core::{CoreError, CoreResult};
use marquee_shared::{Seat, SeatTransition};

use crate::database::map_sqlx_error;

pub struct StoreSeatRepository {
    pool: PgPool,
}

impl StoreSeatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SeatRow {
    id: Uuid,
    showtime_id: Uuid,
    seat_row: String,
    seat_column: i32,
    status: String,
    holder: Option<Uuid>,
    version: i64,
}

impl TryFrom<SeatRow> for Seat {
    type Error = CoreError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        Ok(Seat {
            id: row.id,
            showtime_id: row.showtime_id,
            row: row.seat_row,
            column: u32::try_from(row.seat_column)
                .map_err(|_| CoreError::InternalError(format!("bad seat column {}", row.seat_column)))?,
            status: row.status.parse().map_err(CoreError::InternalError)?,
            holder: row.holder,
            version: row.version,
        })
    }
}

const SEAT_COLUMNS: &str = "id, showtime_id, seat_row, seat_column, status, holder, version";

/// Conditional batch update run on the caller's transaction.
///
/// A single `UPDATE ... WHERE status = $from` statement decides which seats
/// match, so two clerks racing for a seat are serialized by the row lock. If
/// fewer rows than requested were updated the caller must roll back.
pub(crate) async fn transition_in_tx(
    conn: &mut PgConnection,
    showtime_id: Uuid,
    seat_ids: &[Uuid],
    transition: &SeatTransition,
) -> CoreResult<()> {
    let mut seen = HashSet::new();
    let ids: Vec<Uuid> = seat_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

    let updated: Vec<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE seats
        SET status = $1, holder = $2, version = version + 1
        WHERE showtime_id = $3
          AND id = ANY($4)
          AND status = $5
          AND ($6::uuid IS NULL OR holder = $6)
        RETURNING id
        "#,
    )
    .bind(transition.to.as_str())
    .bind(transition.new_holder)
    .bind(showtime_id)
    .bind(&ids)
    .bind(transition.from.as_str())
    .bind(transition.expected_holder)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    if updated.len() == ids.len() {
        return Ok(());
    }

    let existing: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM seats WHERE showtime_id = $1 AND id = ANY($2)")
            .bind(showtime_id)
            .bind(&ids)
            .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

    let missing: Vec<Uuid> = ids.iter().copied().filter(|id| !existing.contains(id)).collect();
    if !missing.is_empty() {
        return Err(CoreError::NotFound(format!(
            "seats {:?} in showtime {}",
            missing, showtime_id
        )));
    }

    let unavailable = ids.into_iter().filter(|id| !updated.contains(id)).collect();
    Err(CoreError::SeatUnavailable { seat_ids: unavailable })
}

#[async_trait]
impl SeatRepository for StoreSeatRepository {
    async fn insert_seats(&self, seats: &[Seat]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for seat in seats {
            let column = i32::try_from(seat.column).map_err(|_| {
                CoreError::ValidationError(format!("seat column {} out of range", seat.column))
            })?;
            sqlx::query(
                r#"
                INSERT INTO seats (id, showtime_id, seat_row, seat_column, status, holder, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(seat.id)
            .bind(seat.showtime_id)
            .bind(&seat.row)
            .bind(column)
            .bind(seat.status.as_str())
            .bind(seat.holder)
            .bind(seat.version)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<Seat>> {
        let rows: Vec<SeatRow> = sqlx::query_as(&format!(
            r#"SELECT {} FROM seats WHERE showtime_id = $1 ORDER BY seat_row COLLATE "C", seat_column"#,
            SEAT_COLUMNS
        ))
        .bind(showtime_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(Seat::try_from).collect()
    }

    async fn get_seat(&self, seat_id: Uuid) -> CoreResult<Option<Seat>> {
        let row: Option<SeatRow> =
            sqlx::query_as(&format!("SELECT {} FROM seats WHERE id = $1", SEAT_COLUMNS))
                .bind(seat_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        row.map(Seat::try_from).transpose()
    }

    async fn transition_seats(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        transition: &SeatTransition,
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        // Dropping `tx` on error rolls back the partial update
        transition_in_tx(&mut *tx, showtime_id, seat_ids, transition).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
