use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use marquee_catalog::SeatLayout;
use marquee_core::identity::Principal;
use marquee_shared::Showtime;
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::require_admin, seats::SeatResponse, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShowtimeRequest {
    pub movie_title: String,
    pub theater_name: String,
    pub room_name: String,
    pub starts_at: DateTime<Utc>,
    pub ticket_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct ProvisionSeatsRequest {
    pub rows: Vec<String>,
    pub columns: Vec<u32>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/showtimes", post(create_showtime))
        .route("/showtimes/{id}", get(get_showtime).delete(delete_showtime))
        .route("/showtimes/{id}/seats", post(provision_seats))
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_showtime(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateShowtimeRequest>,
) -> Result<(StatusCode, Json<Showtime>), AppError> {
    require_admin(&principal)?;

    let showtime = Showtime {
        id: Uuid::new_v4(),
        movie_title: req.movie_title,
        theater_name: req.theater_name,
        room_name: req.room_name,
        starts_at: req.starts_at,
        ticket_price: req.ticket_price,
    };
    state.inventory.create_showtime(&showtime).await?;

    Ok((StatusCode::CREATED, Json(showtime)))
}

async fn get_showtime(
    State(state): State<AppState>,
    Path(showtime_id): Path<Uuid>,
) -> Result<Json<Showtime>, AppError> {
    Ok(Json(state.inventory.get_showtime(showtime_id).await?))
}

async fn delete_showtime(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(showtime_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_admin(&principal)?;
    state.inventory.delete_showtime(showtime_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn provision_seats(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(showtime_id): Path<Uuid>,
    Json(req): Json<ProvisionSeatsRequest>,
) -> Result<(StatusCode, Json<Vec<SeatResponse>>), AppError> {
    require_admin(&principal)?;

    let layout = SeatLayout::new(req.rows, req.columns);
    let seats = state.inventory.provision_seats(showtime_id, &layout).await?;

    Ok((
        StatusCode::CREATED,
        Json(seats.into_iter().map(SeatResponse::from).collect()),
    ))
}
