use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use marquee_order::SeatMapView;
use marquee_shared::{Seat, SeatStatus};
use serde::Serialize;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatResponse {
    pub seat_id: Uuid,
    pub name: String,
    pub row: String,
    pub column: u32,
    pub status: SeatStatus,
}

impl From<Seat> for SeatResponse {
    fn from(seat: Seat) -> Self {
        Self {
            seat_id: seat.id,
            name: seat.name(),
            row: seat.row,
            column: seat.column,
            status: seat.status,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/showtimes/{id}/seats", get(list_seats))
        .route("/showtimes/{id}/seat-map", get(seat_map))
        .route("/showtimes/{id}/stream", get(seat_stream))
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_seats(
    State(state): State<AppState>,
    Path(showtime_id): Path<Uuid>,
) -> Result<Json<Vec<SeatResponse>>, AppError> {
    let seats = state.inventory.list_seats(showtime_id).await?;
    Ok(Json(seats.into_iter().map(SeatResponse::from).collect()))
}

async fn seat_map(
    State(state): State<AppState>,
    Path(showtime_id): Path<Uuid>,
) -> Result<Json<SeatMapView>, AppError> {
    Ok(Json(state.projector.seat_map(showtime_id).await?))
}

/// Live seat changes of one showtime as server-sent `seats` events
async fn seat_stream(
    State(state): State<AppState>,
    Path(showtime_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    state.inventory.get_showtime(showtime_id).await?;
    let rx = state.seat_events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(change) if change.showtime_id == showtime_id => {
                match serde_json::to_string(&change) {
                    Ok(data) => Some(Ok(Event::default().event("seats").data(data))),
                    Err(e) => {
                        tracing::warn!("Failed to encode seat change: {}", e);
                        None
                    }
                }
            }
            Ok(_) => None,
            // Lagged receiver: the client re-fetches the seat map on gaps
            Err(e) => {
                tracing::debug!("Seat stream for {} lagged: {}", showtime_id, e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
