//! Cart handlers: create, inspect, choose a plan, abandon, and pay.

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use mymind_types::order::{Order, OrderId, Plan};
use mymind_types::participant::{ParticipantId, Role};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCartRequest {
    pub therapist_id: ParticipantId,
}

#[derive(Debug, Deserialize)]
pub struct SelectPlanRequest {
    pub plan: Plan,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub order_id: OrderId,
    pub plan: Plan,
    pub cost_cents: u32,
}

/// POST /api/v1/cart - Book a session with a therapist.
pub async fn create_cart(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(body): Json<CreateCartRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let start = Instant::now();
    let order = state
        .ledger
        .create_order(&caller, &body.therapist_id, chrono::Utc::now())
        .await?;
    Ok(Json(ApiResponse::timed(order, start).with_link("self", "/api/v1/cart")))
}

/// GET /api/v1/cart - The caller's unpaid cart (`data: null` when empty).
pub async fn get_cart(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Option<Order>>>, AppError> {
    let start = Instant::now();
    let patient = auth.require(Role::Patient)?;
    let cart = state.ledger.cart(&patient.id).await?;
    Ok(Json(ApiResponse::timed(cart, start)))
}

/// PUT /api/v1/cart - Choose the plan for the cart.
pub async fn select_plan(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(body): Json<SelectPlanRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let start = Instant::now();
    let patient = auth.require(Role::Patient)?;
    let order = state.ledger.select_plan(&patient.id, body.plan).await?;
    Ok(Json(ApiResponse::timed(order, start)))
}

/// DELETE /api/v1/cart - Abandon the cart.
pub async fn delete_cart(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let patient = auth.require(Role::Patient)?;
    let deleted = state.ledger.delete_cart(&patient.id).await?;
    Ok(Json(ApiResponse::timed(serde_json::json!({ "deleted": deleted }), start)))
}

/// POST /api/v1/cart/confirm - Pay for the cart and open the chat window.
pub async fn confirm_cart(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(body): Json<ConfirmRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let start = Instant::now();
    let patient = auth.require(Role::Patient)?;
    let order = state
        .ledger
        .confirm_order(
            &patient.id,
            &body.order_id,
            body.plan,
            body.cost_cents,
            chrono::Utc::now(),
        )
        .await?;
    Ok(Json(
        ApiResponse::timed(order, start).with_link("chat", "/activeChatSession"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{seed_user, test_state};
    use mymind_types::error::{ConflictKind, LedgerError};
    use mymind_types::order::OrderStatus;
    use mymind_types::participant::Participant;

    fn auth(id: ParticipantId, role: Role) -> Authenticated {
        Authenticated(Participant { id, role })
    }

    #[tokio::test]
    async fn cart_lifecycle_through_handlers() {
        let (state, _tmp) = test_state().await;
        let patient = seed_user(&state, Role::Patient, "Pat").await;
        let therapist = seed_user(&state, Role::Therapist, "Tess").await;

        let Json(created) = create_cart(
            State(state.clone()),
            auth(patient.id, Role::Patient),
            Json(CreateCartRequest {
                therapist_id: therapist.id,
            }),
        )
        .await
        .unwrap();
        let cart = created.data.unwrap();
        assert_eq!(cart.status, OrderStatus::Active);

        let second = create_cart(
            State(state.clone()),
            auth(patient.id, Role::Patient),
            Json(CreateCartRequest {
                therapist_id: therapist.id,
            }),
        )
        .await;
        assert!(matches!(
            second,
            Err(AppError::Ledger(LedgerError::Conflict(ConflictKind::CartExists)))
        ));

        let Json(updated) = select_plan(
            State(state.clone()),
            auth(patient.id, Role::Patient),
            Json(SelectPlanRequest { plan: Plan::Year }),
        )
        .await
        .unwrap();
        assert_eq!(updated.data.unwrap().plan, Some(Plan::Year));

        let Json(confirmed) = confirm_cart(
            State(state.clone()),
            auth(patient.id, Role::Patient),
            Json(ConfirmRequest {
                order_id: cart.order_id.clone(),
                plan: Plan::Year,
                cost_cents: 19900,
            }),
        )
        .await
        .unwrap();
        let order = confirmed.data.unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.expires_at.is_some());

        let Json(cart) = get_cart(State(state), auth(patient.id, Role::Patient))
            .await
            .unwrap();
        assert_eq!(cart.data, Some(None));
    }

    #[tokio::test]
    async fn therapists_cannot_use_the_cart() {
        let (state, _tmp) = test_state().await;
        let therapist = seed_user(&state, Role::Therapist, "Tess").await;

        let result = get_cart(State(state.clone()), auth(therapist.id, Role::Therapist)).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let result = delete_cart(State(state), auth(therapist.id, Role::Therapist)).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
