//! SQLite user directory.
//!
//! Implements `UserDirectory` from `mymind-core`. Accounts are created through
//! [`SqliteUserDirectory::create_user`], which the CLI uses for seeding.

use chrono::{DateTime, Utc};
use mymind_core::repository::directory::UserDirectory;
use mymind_types::error::RepositoryError;
use mymind_types::participant::{ParticipantId, Role, UserProfile};
use sqlx::Row;

use super::format_datetime;
use super::pool::DatabasePool;

#[derive(Clone)]
pub struct SqliteUserDirectory {
    pool: DatabasePool,
}

impl SqliteUserDirectory {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Insert a new account. Duplicate emails are a `Conflict`.
    pub async fn create_user(
        &self,
        user: &UserProfile,
        created_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO users (id, role, first_name, last_name, email, phone_num, profile_img,
                                  years_experience, session_cost_cents, num_sessions, used_trial, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(user.id.to_string())
        .bind(user.role.to_string())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.phone_num)
        .bind(&user.profile_img)
        .bind(user.years_experience.map(|v| v as i64))
        .bind(user.session_cost_cents.map(|v| v as i64))
        .bind(user.num_sessions as i64)
        .bind(user.used_trial)
        .bind(format_datetime(&created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("email '{}' is already registered", user.email))
            }
            _ => RepositoryError::Query(e.to_string()),
        })?;

        Ok(())
    }
}

struct UserRow {
    id: String,
    role: String,
    first_name: String,
    last_name: String,
    email: String,
    phone_num: Option<String>,
    profile_img: Option<String>,
    years_experience: Option<i64>,
    session_cost_cents: Option<i64>,
    num_sessions: i64,
    used_trial: bool,
}

impl UserRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            role: row.try_get("role")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            phone_num: row.try_get("phone_num")?,
            profile_img: row.try_get("profile_img")?,
            years_experience: row.try_get("years_experience")?,
            session_cost_cents: row.try_get("session_cost_cents")?,
            num_sessions: row.try_get("num_sessions")?,
            used_trial: row.try_get("used_trial")?,
        })
    }

    fn into_profile(self) -> Result<UserProfile, RepositoryError> {
        let id: ParticipantId = self
            .id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid user id: {e}")))?;
        let role: Role = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(UserProfile {
            id,
            role,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone_num: self.phone_num,
            profile_img: self.profile_img,
            years_experience: self.years_experience.map(|v| v as u32),
            session_cost_cents: self.session_cost_cents.map(|v| v as u32),
            num_sessions: self.num_sessions as u32,
            used_trial: self.used_trial,
        })
    }
}

fn map_profile(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile, RepositoryError> {
    UserRow::from_row(row)
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .into_profile()
}

impl UserDirectory for SqliteUserDirectory {
    async fn get_user(&self, id: &ParticipantId) -> Result<Option<UserProfile>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(map_profile).transpose()
    }

    async fn list_therapists(&self) -> Result<Vec<UserProfile>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM users WHERE role = 'therapist' ORDER BY num_sessions DESC, last_name ASC",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(map_profile).collect()
    }

    async fn increment_sessions(&self, therapist_id: &ParticipantId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET num_sessions = num_sessions + 1 WHERE id = ?")
            .bind(therapist_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
