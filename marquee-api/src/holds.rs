use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use marquee_core::identity::Principal;
use marquee_core::CoreError;
use marquee_shared::HoldToken;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHoldRequest {
    pub seat_ids: Vec<Uuid>,
    pub ttl_seconds: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldResponse {
    pub hold_token: HoldToken,
    pub expires_at: DateTime<Utc>,
    pub seat_ids: Vec<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/showtimes/{id}/holds", post(create_hold))
        .route("/holds/{token}", delete(release_hold))
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_hold(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(showtime_id): Path<Uuid>,
    Json(req): Json<CreateHoldRequest>,
) -> Result<(StatusCode, Json<HoldResponse>), AppError> {
    let ttl = req.ttl_seconds.map(|s| Duration::seconds(i64::from(s)));

    let hold = match state.holds.acquire(&principal, showtime_id, &req.seat_ids, ttl).await {
        Ok(hold) => hold,
        Err(e) => {
            if matches!(e, CoreError::SeatUnavailable { .. }) {
                state.metrics.holds_conflicted.inc();
            }
            return Err(e.into());
        }
    };
    state.metrics.holds_acquired.inc();

    Ok((
        StatusCode::CREATED,
        Json(HoldResponse {
            hold_token: hold.token,
            expires_at: hold.expires_at,
            seat_ids: hold.seat_ids,
        }),
    ))
}

async fn release_hold(
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.holds.release(HoldToken(token)).await?;
    Ok(StatusCode::NO_CONTENT)
}
