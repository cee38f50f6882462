use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use marquee_core::CoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl AppError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::AuthorizationError(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Core(err) => core_response(err),
        };

        (status, Json(body)).into_response()
    }
}

fn core_response(err: CoreError) -> (StatusCode, serde_json::Value) {
    let message = err.to_string();
    match err {
        CoreError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": message })),
        CoreError::SeatUnavailable { seat_ids } => (
            StatusCode::CONFLICT,
            json!({ "error": message, "seatIds": seat_ids }),
        ),
        CoreError::Conflict(_) => (StatusCode::CONFLICT, json!({ "error": message, "seatIds": [] })),
        CoreError::InvalidTransition { .. } | CoreError::ValidationError(_) => {
            (StatusCode::BAD_REQUEST, json!({ "error": message }))
        }
        CoreError::HoldExpired(_) => (StatusCode::GONE, json!({ "error": message })),
        CoreError::Unavailable(_) => {
            tracing::warn!("Storage unavailable: {}", message);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "Service temporarily unavailable" }),
            )
        }
        CoreError::InternalError(_) => {
            tracing::error!("Internal Server Error: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal Server Error" }),
            )
        }
    }
}
