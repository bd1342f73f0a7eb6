//! Directory handlers: therapist listing and profile lookup.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;

use mymind_core::repository::directory::UserDirectory;
use mymind_types::participant::{ParticipantId, UserProfile};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/therapists - Therapists free to book, most-booked first.
pub async fn list_therapists(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<UserProfile>>>, AppError> {
    let start = Instant::now();
    let therapists = state.ledger.available_therapists(chrono::Utc::now()).await?;
    Ok(Json(
        ApiResponse::timed(therapists, start).with_link("self", "/api/v1/therapists"),
    ))
}

/// GET /api/v1/users/{id} - Look up a profile.
pub async fn get_user(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    let start = Instant::now();
    let id: ParticipantId = id
        .parse()
        .map_err(|e| AppError::Validation(format!("invalid user id '{id}': {e}")))?;
    let user = state
        .users
        .get_user(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))?;
    Ok(Json(ApiResponse::timed(user, start)))
}
