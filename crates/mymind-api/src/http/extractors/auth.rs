//! Participant token authentication extractors.
//!
//! Tokens are read from:
//! - `Authorization: Bearer <token>` header
//! - `?token=<token>` query parameter (WebSocket upgrades)
//!
//! and resolved through `participant_tokens` to a [`Participant`].

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;

use mymind_types::participant::{Participant, Role};

use crate::http::error::AppError;
use crate::http::extractors::query::TokenQuery;
use crate::state::AppState;

/// An authenticated caller. Extracting this validates the token.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Participant);

impl Authenticated {
    /// Reject callers whose account is not `role`.
    pub fn require(self, role: Role) -> Result<Participant, AppError> {
        if self.0.role == role {
            Ok(self.0)
        } else {
            Err(AppError::Forbidden(format!("this endpoint is for {role} accounts")))
        }
    }
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)?.ok_or_else(|| {
            AppError::Unauthorized(
                "Missing token. Provide via 'Authorization: Bearer <token>' or '?token=<token>'."
                    .to_string(),
            )
        })?;

        match resolve(state, &token).await? {
            Some(participant) => Ok(Authenticated(participant)),
            None => Err(AppError::Unauthorized("Invalid token.".to_string())),
        }
    }
}

/// Like [`Authenticated`], but a missing or unknown token is `None` instead
/// of a rejection.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuthenticated(pub Option<Participant>);

impl FromRequestParts<AppState> for MaybeAuthenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(Some(token)) = extract_token(parts) else {
            return Ok(MaybeAuthenticated(None));
        };
        Ok(MaybeAuthenticated(resolve(state, &token).await?))
    }
}

async fn resolve(state: &AppState, token: &str) -> Result<Option<Participant>, AppError> {
    state
        .tokens
        .authenticate(token, chrono::Utc::now())
        .await
        .map_err(|e| AppError::Internal(format!("Database error: {e}")))
}

/// Pull the plaintext token from the request, header first.
fn extract_token(parts: &Parts) -> Result<Option<String>, AppError> {
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return Ok(Some(token.trim().to_string()));
        }
    }

    let query = Query::<TokenQuery>::try_from_uri(&parts.uri)
        .map(|Query(q)| q)
        .unwrap_or_default();
    Ok(query.token.filter(|t| !t.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(uri: &str, bearer: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn header_wins_over_query() {
        let p = parts("/ws/chat?token=from_query", Some("from_header"));
        assert_eq!(extract_token(&p).unwrap().as_deref(), Some("from_header"));
    }

    #[test]
    fn query_token_used_for_websockets() {
        let p = parts("/ws/chat?token=mym_abc", None);
        assert_eq!(extract_token(&p).unwrap().as_deref(), Some("mym_abc"));
    }

    #[test]
    fn missing_or_empty_token_is_none() {
        assert!(extract_token(&parts("/activeChatSession", None)).unwrap().is_none());
        assert!(extract_token(&parts("/ws/chat?token=", None)).unwrap().is_none());
    }

    #[test]
    fn require_checks_role() {
        let participant = Participant {
            id: mymind_types::participant::ParticipantId::new(),
            role: Role::Therapist,
        };
        assert!(Authenticated(participant).require(Role::Therapist).is_ok());
        assert!(matches!(
            Authenticated(participant).require(Role::Patient),
            Err(AppError::Forbidden(_))
        ));
    }
}
