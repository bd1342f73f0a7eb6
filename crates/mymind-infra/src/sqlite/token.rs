//! Bearer tokens for participants.
//!
//! Tokens are random, shown once at issue time, and stored only as a
//! lowercase-hex SHA-256 digest in `participant_tokens`.

use chrono::{DateTime, Utc};
use mymind_types::error::RepositoryError;
use mymind_types::participant::{Participant, ParticipantId, Role};
use sha2::{Digest, Sha256};
use sqlx::Row;
use uuid::Uuid;

use super::format_datetime;
use super::pool::DatabasePool;

const TOKEN_PREFIX: &str = "mym_";

/// Compute SHA-256 hash of a token (lowercase hex).
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{:x}", digest)
}

/// Fresh plaintext token: `mym_` followed by 64 hex characters.
pub fn generate_token() -> String {
    format!(
        "{TOKEN_PREFIX}{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

#[derive(Clone)]
pub struct SqliteTokenStore {
    pool: DatabasePool,
}

impl SqliteTokenStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Issue a new token for `user_id`. Returns the plaintext, which is not stored.
    pub async fn issue(&self, user_id: &ParticipantId, now: DateTime<Utc>) -> Result<String, RepositoryError> {
        let token = generate_token();
        sqlx::query("INSERT INTO participant_tokens (id, token_hash, user_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(Uuid::now_v7().to_string())
            .bind(hash_token(&token))
            .bind(user_id.to_string())
            .bind(format_datetime(&now))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepositoryError::NotFound,
                _ => RepositoryError::Query(e.to_string()),
            })?;
        Ok(token)
    }

    /// Resolve a plaintext token to the participant it was issued to.
    pub async fn authenticate(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Participant>, RepositoryError> {
        let token_hash = hash_token(token);
        let row = sqlx::query(
            r#"SELECT t.id AS token_id, u.id AS user_id, u.role AS role
               FROM participant_tokens t JOIN users u ON u.id = t.user_id
               WHERE t.token_hash = ?"#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let token_id: String = row.try_get("token_id").map_err(|e| RepositoryError::Query(e.to_string()))?;
        let user_id: String = row.try_get("user_id").map_err(|e| RepositoryError::Query(e.to_string()))?;
        let role: String = row.try_get("role").map_err(|e| RepositoryError::Query(e.to_string()))?;

        let id: ParticipantId = user_id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid user id: {e}")))?;
        let role: Role = role.parse().map_err(|e: String| RepositoryError::Query(e))?;

        // Best effort; a failed bookkeeping write must not reject the request.
        if let Err(e) = sqlx::query("UPDATE participant_tokens SET last_used_at = ? WHERE id = ?")
            .bind(format_datetime(&now))
            .bind(&token_id)
            .execute(&self.pool.writer)
            .await
        {
            tracing::debug!(error = %e, "failed to record token use");
        }

        Ok(Some(Participant { id, role }))
    }
}
