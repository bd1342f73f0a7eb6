//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod message;
pub mod order;
pub mod pool;
pub mod token;
pub mod user;

use chrono::{DateTime, SecondsFormat, Utc};
use mymind_types::error::RepositoryError;

// Timestamps are stored as fixed-width RFC 3339 (microseconds, `Z`) so that
// string comparison in SQL agrees with chronological order.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, SubsecRound, Utc};
    use mymind_types::participant::{ParticipantId, Role, UserProfile};

    use super::pool::DatabasePool;
    use super::user::SqliteUserDirectory;

    pub async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    /// Current time at storage precision, so round-tripped values compare equal.
    pub fn now() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }

    pub fn profile(role: Role, first: &str, num_sessions: u32) -> UserProfile {
        UserProfile {
            id: ParticipantId::new(),
            role,
            first_name: first.to_string(),
            last_name: "Test".to_string(),
            email: format!("{}.{}@example.com", first.to_lowercase(), uuid::Uuid::new_v4()),
            phone_num: None,
            profile_img: None,
            years_experience: None,
            session_cost_cents: None,
            num_sessions,
            used_trial: false,
        }
    }

    pub async fn seed_user(pool: &DatabasePool, role: Role, first: &str) -> UserProfile {
        let user = profile(role, first, 0);
        SqliteUserDirectory::new(pool.clone())
            .create_user(&user, now())
            .await
            .unwrap();
        user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_datetime_strings_sort_chronologically() {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let later = base + Duration::microseconds(500_000);
        let a = format_datetime(&base);
        let b = format_datetime(&later);
        assert_eq!(a, "2026-03-01T12:00:00.000000Z");
        assert!(a < b);
        assert_eq!(parse_datetime(&b).unwrap(), later);
    }
}
