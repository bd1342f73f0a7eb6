use thiserror::Error;

use std::fmt;

/// Errors from repository operations (used by trait definitions in mymind-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Why a booking request was refused. The string codes are part of the
/// HTTP surface and are shown to users verbatim by the web client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The patient already has an unpaid cart.
    CartExists,
    /// The patient already has a live paid session.
    OrderExists,
    /// The therapist is inside another patient's live window.
    TherapistBusy,
    /// The free trial was already consumed.
    TrialUsed,
}

impl ConflictKind {
    pub fn code(&self) -> &'static str {
        match self {
            ConflictKind::CartExists => "cartExists",
            ConflictKind::OrderExists => "orderExists",
            ConflictKind::TherapistBusy => "therapistBusy",
            ConflictKind::TrialUsed => "trialUsed",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors from the entitlement ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("conflict: {0}")]
    Conflict(ConflictKind),

    #[error("order not found")]
    NotFound,

    /// The order exists but is not in a state that allows the transition
    /// (e.g. confirming a deleted cart, refunding an expired order).
    #[error("invalid order state: {0}")]
    InvalidState(String),

    #[error("not permitted: {0}")]
    Forbidden(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for LedgerError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => LedgerError::NotFound,
            other => LedgerError::Storage(other.to_string()),
        }
    }
}

/// Errors from the chat room broker.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The caller has no live order with this id.
    #[error("not entitled to order {0}")]
    NotEntitled(String),

    /// A message was sent before `join_room`.
    #[error("connection has not joined a room")]
    NotJoined,

    /// The sender id on the wire does not match the authenticated caller.
    #[error("sender mismatch")]
    SenderMismatch,

    /// The order lapsed or was refunded while the connection was open.
    #[error("session ended")]
    SessionEnded,

    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Machine-readable code carried in WebSocket `error` frames.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::NotEntitled(_) => "notEntitled",
            ChatError::NotJoined => "notJoined",
            ChatError::SenderMismatch => "senderMismatch",
            ChatError::SessionEnded => "sessionEnded",
            ChatError::Storage(_) => "storageError",
        }
    }
}
