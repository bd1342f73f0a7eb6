//! User directory trait definition.
//!
//! Account CRUD lives outside this system; the core only needs lookups,
//! the therapist listing, and the completed-session counter.

use mymind_types::error::RepositoryError;
use mymind_types::participant::{ParticipantId, UserProfile};

/// Read-mostly access to user profiles.
pub trait UserDirectory: Send + Sync {
    /// Look up a user by id.
    fn get_user(
        &self,
        id: &ParticipantId,
    ) -> impl std::future::Future<Output = Result<Option<UserProfile>, RepositoryError>> + Send;

    /// All therapists, most-booked first (`num_sessions` DESC).
    fn list_therapists(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<UserProfile>, RepositoryError>> + Send;

    /// Increment a therapist's completed-session counter.
    fn increment_sessions(
        &self,
        therapist_id: &ParticipantId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
