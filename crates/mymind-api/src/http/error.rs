//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use mymind_types::error::{ChatError, ConflictKind, LedgerError, RepositoryError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Booking and entitlement errors.
    Ledger(LedgerError),
    /// Chat history access errors.
    Chat(ChatError),
    /// Authentication failure.
    Unauthorized(String),
    /// Authenticated, but the wrong kind of account for this endpoint.
    Forbidden(String),
    /// Missing resource outside the ledger (e.g. directory lookup).
    NotFound(String),
    /// Validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<LedgerError> for AppError {
    fn from(e: LedgerError) -> Self {
        AppError::Ledger(e)
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => AppError::NotFound("Not found".to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl AppError {
    /// Status, machine-readable code and message for the envelope.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Ledger(LedgerError::Conflict(kind)) => {
                (StatusCode::CONFLICT, kind.code(), conflict_message(*kind).to_string())
            }
            AppError::Ledger(LedgerError::NotFound) => {
                (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND", "Order not found".to_string())
            }
            AppError::Ledger(LedgerError::InvalidState(msg)) => {
                (StatusCode::CONFLICT, "INVALID_STATE", msg.clone())
            }
            AppError::Ledger(LedgerError::Forbidden(msg)) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone())
            }
            AppError::Ledger(LedgerError::Storage(msg)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", msg.clone())
            }
            AppError::Chat(e @ ChatError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.code(), e.to_string())
            }
            AppError::Chat(e) => (StatusCode::FORBIDDEN, e.code(), e.to_string()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

fn conflict_message(kind: ConflictKind) -> &'static str {
    match kind {
        ConflictKind::CartExists => "An unpaid cart already exists",
        ConflictKind::OrderExists => "You already have a live session",
        ConflictKind::TherapistBusy => "The therapist is in another session",
        ConflictKind::TrialUsed => "The free trial has already been used",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(%code, %message, "request failed");
        }

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_409_with_kind_code() {
        let (status, code, _) =
            AppError::from(LedgerError::Conflict(ConflictKind::TherapistBusy)).parts();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "therapistBusy");

        let (_, code, message) = AppError::from(LedgerError::Conflict(ConflictKind::TrialUsed)).parts();
        assert_eq!(code, "trialUsed");
        assert!(message.contains("free trial"));
    }

    #[test]
    fn chat_errors_are_forbidden_unless_storage() {
        let (status, code, _) = AppError::from(ChatError::NotEntitled("MM1".to_string())).parts();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(code, "notEntitled");

        let (status, _, _) = AppError::from(ChatError::Storage("disk".to_string())).parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn repository_not_found_is_404() {
        let (status, _, _) = AppError::from(RepositoryError::NotFound).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn into_response_uses_envelope() {
        let response = AppError::Unauthorized("missing token".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["data"].is_null());
        assert_eq!(body["errors"][0]["code"], "UNAUTHORIZED");
        assert_eq!(body["errors"][0]["message"], "missing token");
    }
}
