//! Order repository trait definition.
//!
//! The storage port behind the entitlement ledger. Uniqueness invariants
//! (one cart per patient, one live session per patient and per therapist)
//! are the implementation's responsibility: the check and the write must be
//! atomic with respect to concurrent callers.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use mymind_types::error::LedgerError;
use mymind_types::order::{Order, OrderId, Plan};
use mymind_types::participant::ParticipantId;

/// Confirmation payload applied to an active cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub plan: Plan,
    pub cost_cents: u32,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Repository trait for order persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait OrderRepository: Send + Sync {
    /// Insert a new cart (`status = active`).
    ///
    /// Atomically rejects with:
    /// - `Conflict(CartExists)` if the patient already has an active cart,
    /// - `Conflict(OrderExists)` if the patient has a live completed order,
    /// - `Conflict(TherapistBusy)` if the therapist has a live completed order.
    fn insert_cart(
        &self,
        order: &Order,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;

    /// Get an order by its id.
    fn get_order(
        &self,
        order_id: &OrderId,
    ) -> impl std::future::Future<Output = Result<Option<Order>, LedgerError>> + Send;

    /// The patient's active (unpaid) cart, if any.
    fn active_cart(
        &self,
        patient_id: &ParticipantId,
    ) -> impl std::future::Future<Output = Result<Option<Order>, LedgerError>> + Send;

    /// Record the plan chosen for the patient's active cart.
    ///
    /// Returns `NotFound` if the patient has no active cart.
    fn set_cart_plan(
        &self,
        patient_id: &ParticipantId,
        plan: Plan,
    ) -> impl std::future::Future<Output = Result<Order, LedgerError>> + Send;

    /// Mark the patient's active cart as deleted. Returns `true` if a cart existed.
    fn delete_cart(
        &self,
        patient_id: &ParticipantId,
    ) -> impl std::future::Future<Output = Result<bool, LedgerError>> + Send;

    /// Transition an active cart to completed.
    ///
    /// Atomically rejects with `Conflict(TherapistBusy)` if the therapist
    /// has another live order at `purchased_at`, and `Conflict(TrialUsed)`
    /// if the plan is the free trial and the patient already used it (the
    /// trial flag is set in the same transaction). Returns `InvalidState`
    /// if the order is not an active cart.
    fn confirm(
        &self,
        order_id: &OrderId,
        confirmation: &Confirmation,
    ) -> impl std::future::Future<Output = Result<Order, LedgerError>> + Send;

    /// Transition a live completed order to refunded, setting `expires_at = now`.
    ///
    /// Returns `InvalidState` if the order is not live at `now`.
    fn refund(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Order, LedgerError>> + Send;

    /// The most recently purchased live order involving the participant
    /// as patient or therapist.
    fn find_live_order(
        &self,
        participant_id: &ParticipantId,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<Order>, LedgerError>> + Send;

    /// Therapists with a live order at `now`.
    fn busy_therapists(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<HashSet<ParticipantId>, LedgerError>> + Send;

    /// Completed and refunded orders where the participant is the patient,
    /// most recent purchase first.
    fn patient_history(
        &self,
        patient_id: &ParticipantId,
    ) -> impl std::future::Future<Output = Result<Vec<Order>, LedgerError>> + Send;

    /// Completed and refunded orders where the participant is the therapist,
    /// most recent purchase first.
    fn therapist_history(
        &self,
        therapist_id: &ParticipantId,
    ) -> impl std::future::Future<Output = Result<Vec<Order>, LedgerError>> + Send;
}
