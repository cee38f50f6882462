use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

use crate::{error::AppError, state::AppState};

/// Service counters, kept in a per-process registry
pub struct Metrics {
    registry: Registry,
    pub holds_acquired: IntCounter,
    pub holds_conflicted: IntCounter,
    pub holds_expired: IntCounter,
    pub orders_created: IntCounter,
    pub orders_cancelled: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("marquee".into()), None)?;

        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };

        Ok(Self {
            holds_acquired: counter("holds_acquired_total", "Seat holds granted")?,
            holds_conflicted: counter("holds_conflicted_total", "Hold requests that lost a seat race")?,
            holds_expired: counter("holds_expired_total", "Holds released by the sweeper")?,
            orders_created: counter("orders_created_total", "Orders checked out")?,
            orders_cancelled: counter("orders_cancelled_total", "Orders cancelled")?,
            registry,
        })
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::Core(marquee_core::CoreError::InternalError(e.to_string())))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
