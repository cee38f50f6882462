use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use marquee_core::identity::Principal;
use marquee_order::{CreateOrder, OrderView};
use marquee_shared::{HoldToken, OrderFilter, OrderStatus, PaymentMethod, Ticket};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::{require_admin, require_staff},
    state::AppState,
};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub showtime_id: Uuid,
    pub hold_token: HoldToken,
    pub payment_method: String,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub amount_tendered: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub total_amount: i64,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_due: Option<i64>,
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub customer_id: Option<String>,
    pub showtime_id: Option<Uuid>,
    #[serde(default)]
    pub all: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order).delete(delete_order))
        .route("/orders/{id}/status", put(update_status))
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    let payment_method: PaymentMethod = req
        .payment_method
        .parse()
        .map_err(AppError::ValidationError)?;

    let checkout = state
        .ledger
        .create_order(
            &principal,
            CreateOrder {
                showtime_id: req.showtime_id,
                hold_token: req.hold_token,
                payment_method,
                customer_id: req.customer_id,
                customer_name: req.customer_name,
                amount_tendered: req.amount_tendered,
            },
        )
        .await?;
    state.metrics.orders_created.inc();

    let order = checkout.order;
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order_id: order.id,
            total_amount: order.total_amount,
            status: order.status,
            change_due: checkout.change_due,
            tickets: order.tickets,
        }),
    ))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderView>, AppError> {
    let view = state.projector.order_view(order_id).await?;

    let visible = match &view.customer_id {
        Some(customer_id) => principal.can_view_orders_of(customer_id),
        None => principal.is_staff(),
    };
    if !visible {
        return Err(AppError::forbidden("not your order"));
    }
    Ok(Json(view))
}

async fn list_orders(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderView>>, AppError> {
    let filter = if query.all {
        require_staff(&principal)?;
        OrderFilter { customer_id: None, showtime_id: query.showtime_id, all: true }
    } else {
        let customer_id = match query.customer_id {
            Some(id) => id,
            // Customers default to their own history
            None if !principal.is_staff() => principal.subject.clone(),
            None => {
                return Err(AppError::ValidationError(
                    "either customerId or all=true is required".into(),
                ));
            }
        };
        if !principal.can_view_orders_of(&customer_id) {
            return Err(AppError::forbidden("not your orders"));
        }
        OrderFilter { customer_id: Some(customer_id), showtime_id: query.showtime_id, all: false }
    };

    Ok(Json(state.projector.order_views(&filter).await?))
}

async fn update_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderView>, AppError> {
    require_staff(&principal)?;
    let status: OrderStatus = req
        .status
        .to_ascii_uppercase()
        .parse()
        .map_err(AppError::ValidationError)?;

    state.ledger.update_status(order_id, status).await?;
    if status == OrderStatus::Cancelled {
        state.metrics.orders_cancelled.inc();
    }
    tracing::info!("{} set order {} to {}", principal.subject, order_id, status);

    Ok(Json(state.projector.order_view(order_id).await?))
}

async fn delete_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(order_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_admin(&principal)?;
    state.ledger.delete_order(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
