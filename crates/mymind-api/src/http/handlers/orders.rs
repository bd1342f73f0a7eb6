//! Order handlers: live session summary, purchase history, refunds.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use mymind_types::chat::SessionSentinel;
use mymind_types::order::{Order, OrderId};
use mymind_types::participant::Role;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// The live order, or the `"NoActiveSession"` string.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LiveOrder {
    Order(Box<Order>),
    Sentinel(SessionSentinel),
}

/// GET /api/v1/orders/active - The caller's live order.
pub async fn active_order(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<Json<ApiResponse<LiveOrder>>, AppError> {
    let start = Instant::now();
    let live = match state.ledger.live_order(&caller.id, chrono::Utc::now()).await? {
        Some(order) => LiveOrder::Order(Box::new(order)),
        None => LiveOrder::Sentinel(SessionSentinel::NoActiveSession),
    };
    Ok(Json(ApiResponse::timed(live, start)))
}

/// GET /api/v1/orders/recent - Most recent completed purchase.
pub async fn recent_order(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Option<Order>>>, AppError> {
    let start = Instant::now();
    let patient = auth.require(Role::Patient)?;
    let order = state.ledger.recent_purchase(&patient.id).await?;
    Ok(Json(ApiResponse::timed(order, start)))
}

/// GET /api/v1/orders/history - Completed and refunded orders, newest first.
pub async fn order_history(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<Order>>>, AppError> {
    let start = Instant::now();
    let patient = auth.require(Role::Patient)?;
    let orders = state.ledger.order_history(&patient.id).await?;
    Ok(Json(
        ApiResponse::timed(orders, start).with_link("self", "/api/v1/orders/history"),
    ))
}

/// POST /api/v1/orders/{id}/refund - Refund a live order.
pub async fn refund_order(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let start = Instant::now();
    let order = state
        .ledger
        .refund_order(&caller, &OrderId(order_id), chrono::Utc::now())
        .await?;
    Ok(Json(ApiResponse::timed(order, start)))
}

/// GET /api/v1/patients/history - Therapist's completed and refunded bookings.
pub async fn patient_history(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<Order>>>, AppError> {
    let start = Instant::now();
    let therapist = auth.require(Role::Therapist)?;
    let orders = state.ledger.patient_history(&therapist.id).await?;
    Ok(Json(ApiResponse::timed(orders, start)))
}
