//! Entitlement service orchestrating the order lifecycle.
//!
//! EntitlementService coordinates between the OrderRepository, the
//! UserDirectory, and the side-effect queue. Every method takes `now`
//! explicitly so expiry decisions are reproducible in tests.

use chrono::{DateTime, Utc};
use mymind_types::config::PlanConfig;
use mymind_types::error::LedgerError;
use mymind_types::order::{ActiveSession, Order, OrderId, OrderStatus, Plan};
use mymind_types::participant::{Participant, ParticipantId, Role, UserProfile};
use tracing::{debug, info};

use crate::effects::{EffectQueue, SideEffect};
use crate::repository::directory::UserDirectory;
use crate::repository::order::{Confirmation, OrderRepository};

/// Orchestrates carts, confirmations, refunds and entitlement lookups.
///
/// Generic over `OrderRepository` and `UserDirectory` to maintain
/// clean architecture (mymind-core never depends on mymind-infra).
pub struct EntitlementService<O: OrderRepository, U: UserDirectory> {
    orders: O,
    directory: U,
    plans: PlanConfig,
    effects: EffectQueue,
}

impl<O: OrderRepository, U: UserDirectory> EntitlementService<O, U> {
    pub fn new(orders: O, directory: U, plans: PlanConfig, effects: EffectQueue) -> Self {
        Self {
            orders,
            directory,
            plans,
            effects,
        }
    }

    /// Access the order repository.
    pub fn orders(&self) -> &O {
        &self.orders
    }

    /// Access the user directory.
    pub fn directory(&self) -> &U {
        &self.directory
    }

    pub fn plans(&self) -> &PlanConfig {
        &self.plans
    }

    // --- Entitlement ---

    /// Resolve whether `participant_id` may chat at `now`, and with whom.
    ///
    /// `None` is the "no active session" sentinel.
    pub async fn resolve_active_session(
        &self,
        participant_id: &ParticipantId,
        now: DateTime<Utc>,
    ) -> Result<Option<ActiveSession>, LedgerError> {
        let order = self.orders.find_live_order(participant_id, now).await?;
        Ok(order.and_then(|o| ActiveSession::from_order(&o, participant_id, now)))
    }

    /// The live order behind the participant's active session, if any.
    pub async fn live_order(
        &self,
        participant_id: &ParticipantId,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, LedgerError> {
        self.orders.find_live_order(participant_id, now).await
    }

    // --- Cart lifecycle ---

    /// Put a session with `therapist_id` in the patient's cart.
    pub async fn create_order(
        &self,
        patient: &Participant,
        therapist_id: &ParticipantId,
        now: DateTime<Utc>,
    ) -> Result<Order, LedgerError> {
        if patient.role != Role::Patient {
            return Err(LedgerError::Forbidden(
                "only patients can book sessions".to_string(),
            ));
        }
        self.require_therapist(therapist_id).await?;

        let order = Order {
            order_id: OrderId::generate(),
            patient_id: patient.id,
            therapist_id: *therapist_id,
            status: OrderStatus::Active,
            plan: None,
            cost_cents: None,
            created_at: now,
            purchased_at: None,
            expires_at: None,
        };
        self.orders.insert_cart(&order, now).await?;

        info!(order_id = %order.order_id, patient_id = %patient.id, %therapist_id, "cart created");
        Ok(order)
    }

    /// The patient's unpaid cart, if any.
    pub async fn cart(&self, patient_id: &ParticipantId) -> Result<Option<Order>, LedgerError> {
        self.orders.active_cart(patient_id).await
    }

    /// Choose the plan for the patient's cart.
    pub async fn select_plan(
        &self,
        patient_id: &ParticipantId,
        plan: Plan,
    ) -> Result<Order, LedgerError> {
        let order = self.orders.set_cart_plan(patient_id, plan).await?;
        debug!(order_id = %order.order_id, %plan, "cart plan updated");
        Ok(order)
    }

    /// Abandon the patient's cart. Returns `true` if there was one.
    pub async fn delete_cart(&self, patient_id: &ParticipantId) -> Result<bool, LedgerError> {
        let deleted = self.orders.delete_cart(patient_id).await?;
        if deleted {
            info!(%patient_id, "cart deleted");
        }
        Ok(deleted)
    }

    /// Pay for the cart: `active -> completed`, `expires_at = now + plan length`.
    ///
    /// The therapist counter increment and the confirmation emails are queued
    /// for the background worker; this call never waits on them.
    pub async fn confirm_order(
        &self,
        patient_id: &ParticipantId,
        order_id: &OrderId,
        plan: Plan,
        cost_cents: u32,
        now: DateTime<Utc>,
    ) -> Result<Order, LedgerError> {
        let existing = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(LedgerError::NotFound)?;
        if existing.patient_id != *patient_id {
            return Err(LedgerError::Forbidden(format!(
                "order {order_id} belongs to another patient"
            )));
        }

        let confirmation = Confirmation {
            plan,
            cost_cents,
            purchased_at: now,
            expires_at: now + self.plans.duration(plan),
        };
        let order = self.orders.confirm(order_id, &confirmation).await?;

        info!(
            order_id = %order.order_id,
            therapist_id = %order.therapist_id,
            %plan,
            expires_at = %confirmation.expires_at,
            "order confirmed"
        );

        self.effects.enqueue(SideEffect::IncrementTherapistSessions {
            therapist_id: order.therapist_id,
        });
        // One effect per recipient; each is retried on its own.
        self.effects.enqueue(SideEffect::NotifyPatient {
            order: order.clone(),
        });
        self.effects.enqueue(SideEffect::NotifyTherapist {
            order: order.clone(),
        });

        Ok(order)
    }

    /// Refund a live order, revoking chat access immediately.
    ///
    /// Only the patient who paid (or an admin) may refund.
    pub async fn refund_order(
        &self,
        caller: &Participant,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> Result<Order, LedgerError> {
        let existing = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(LedgerError::NotFound)?;
        if caller.role != Role::Admin && existing.patient_id != caller.id {
            return Err(LedgerError::Forbidden(format!(
                "order {order_id} belongs to another patient"
            )));
        }

        let order = self.orders.refund(order_id, now).await?;
        info!(order_id = %order.order_id, "order refunded");
        Ok(order)
    }

    // --- Listings ---

    /// Completed and refunded orders the patient paid for.
    pub async fn order_history(&self, patient_id: &ParticipantId) -> Result<Vec<Order>, LedgerError> {
        self.orders.patient_history(patient_id).await
    }

    /// Completed and refunded orders booked with the therapist.
    pub async fn patient_history(&self, therapist_id: &ParticipantId) -> Result<Vec<Order>, LedgerError> {
        self.orders.therapist_history(therapist_id).await
    }

    /// The patient's most recent completed purchase (for the thank-you page).
    pub async fn recent_purchase(&self, patient_id: &ParticipantId) -> Result<Option<Order>, LedgerError> {
        let history = self.orders.patient_history(patient_id).await?;
        Ok(history
            .into_iter()
            .find(|o| o.status == OrderStatus::Completed))
    }

    /// Therapists not currently inside a live session, most-booked first.
    pub async fn available_therapists(&self, now: DateTime<Utc>) -> Result<Vec<UserProfile>, LedgerError> {
        let busy = self.orders.busy_therapists(now).await?;
        let mut therapists = self.directory.list_therapists().await?;
        therapists.retain(|t| !busy.contains(&t.id));
        Ok(therapists)
    }

    async fn require_therapist(&self, therapist_id: &ParticipantId) -> Result<UserProfile, LedgerError> {
        match self.directory.get_user(therapist_id).await? {
            Some(user) if user.role == Role::Therapist => Ok(user),
            Some(_) => Err(LedgerError::InvalidState(format!(
                "{therapist_id} is not a therapist"
            ))),
            None => Err(LedgerError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{patient_profile, therapist_profile, InMemoryDirectory, InMemoryOrders};
    use chrono::Duration;
    use mymind_types::error::ConflictKind;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct Fixture {
        service: Arc<EntitlementService<InMemoryOrders, InMemoryDirectory>>,
        orders: InMemoryOrders,
        effects_rx: mpsc::Receiver<SideEffect>,
        patient: Participant,
        therapist: ParticipantId,
        directory: InMemoryDirectory,
    }

    fn fixture() -> Fixture {
        let orders = InMemoryOrders::default();
        let directory = InMemoryDirectory::default();
        let patient = patient_profile("Pat", "Lee");
        let therapist = therapist_profile("Tess", "Ng", 0);
        directory.insert(patient.clone());
        directory.insert(therapist.clone());
        let (effects, effects_rx) = EffectQueue::new(16);
        let service = EntitlementService::new(
            orders.clone(),
            directory.clone(),
            PlanConfig::default(),
            effects,
        );
        Fixture {
            service: Arc::new(service),
            orders,
            effects_rx,
            patient: Participant {
                id: patient.id,
                role: Role::Patient,
            },
            therapist: therapist.id,
            directory,
        }
    }

    async fn book(f: &Fixture, plan: Plan, at: DateTime<Utc>) -> Order {
        let cart = f.service.create_order(&f.patient, &f.therapist, at).await.unwrap();
        f.service
            .confirm_order(&f.patient.id, &cart.order_id, plan, 4000, at)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn scenario_five_minute_plan_expires() {
        let f = fixture();
        let t0 = Utc::now();
        let order = book(&f, Plan::Month, t0).await;

        let session = f
            .service
            .resolve_active_session(&f.patient.id, t0 + Duration::seconds(60))
            .await
            .unwrap()
            .expect("session should be active one minute in");
        assert_eq!(session.order_id, order.order_id);
        assert_eq!(session.counterpart_id, f.therapist);
        assert_eq!(
            session.remaining(t0 + Duration::seconds(60)),
            Duration::seconds(240)
        );

        let lapsed = f
            .service
            .resolve_active_session(&f.patient.id, t0 + Duration::seconds(301))
            .await
            .unwrap();
        assert!(lapsed.is_none());
    }

    #[tokio::test]
    async fn therapist_resolves_same_session() {
        let f = fixture();
        let t0 = Utc::now();
        let order = book(&f, Plan::Month, t0).await;

        let session = f
            .service
            .resolve_active_session(&f.therapist, t0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.order_id, order.order_id);
        assert_eq!(session.counterpart_id, f.patient.id);
        assert_eq!(session.role, mymind_types::order::SessionRole::Therapist);
    }

    #[tokio::test]
    async fn second_cart_is_rejected() {
        let f = fixture();
        let now = Utc::now();
        f.service.create_order(&f.patient, &f.therapist, now).await.unwrap();

        let err = f
            .service
            .create_order(&f.patient, &f.therapist, now)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(ConflictKind::CartExists)));
        assert_eq!(f.orders.all().len(), 1);
    }

    #[tokio::test]
    async fn cart_rejected_while_session_live() {
        let f = fixture();
        let t0 = Utc::now();
        book(&f, Plan::Month, t0).await;

        let err = f
            .service
            .create_order(&f.patient, &f.therapist, t0 + Duration::seconds(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(ConflictKind::OrderExists)));

        // Once the window lapses, booking is allowed again.
        f.service
            .create_order(&f.patient, &f.therapist, t0 + Duration::minutes(6))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn busy_therapist_rejects_other_patient() {
        let f = fixture();
        let t0 = Utc::now();
        book(&f, Plan::Month, t0).await;

        let other = patient_profile("Olive", "Park");
        f.directory.insert(other.clone());
        let other = Participant {
            id: other.id,
            role: Role::Patient,
        };
        let err = f
            .service
            .create_order(&other, &f.therapist, t0 + Duration::seconds(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(ConflictKind::TherapistBusy)));
    }

    #[tokio::test]
    async fn therapist_cannot_book() {
        let f = fixture();
        let caller = Participant {
            id: f.therapist,
            role: Role::Therapist,
        };
        let err = f
            .service
            .create_order(&caller, &f.therapist, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden(_)));
    }

    #[tokio::test]
    async fn booking_unknown_therapist_fails() {
        let f = fixture();
        let err = f
            .service
            .create_order(&f.patient, &ParticipantId::new(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound));
    }

    #[tokio::test]
    async fn concurrent_create_yields_single_cart() {
        let f = fixture();
        let now = Utc::now();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let service = f.service.clone();
            let patient = f.patient;
            let therapist = f.therapist;
            handles.push(tokio::spawn(async move {
                service.create_order(&patient, &therapist, now).await
            }));
        }
        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(LedgerError::Conflict(ConflictKind::CartExists)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok, 1);
        let active = f
            .orders
            .all()
            .into_iter()
            .filter(|o| o.status == OrderStatus::Active)
            .count();
        assert_eq!(active, 1);
    }

    #[tokio::test]
    async fn confirm_queues_side_effects() {
        let mut f = fixture();
        let order = book(&f, Plan::Year, Utc::now()).await;

        assert_eq!(
            f.effects_rx.recv().await.unwrap(),
            SideEffect::IncrementTherapistSessions {
                therapist_id: f.therapist
            }
        );
        match f.effects_rx.recv().await.unwrap() {
            SideEffect::NotifyPatient { order: queued } => {
                assert_eq!(queued.order_id, order.order_id);
            }
            other => panic!("unexpected effect: {other:?}"),
        }
        match f.effects_rx.recv().await.unwrap() {
            SideEffect::NotifyTherapist { order: queued } => {
                assert_eq!(queued.order_id, order.order_id);
            }
            other => panic!("unexpected effect: {other:?}"),
        }
    }

    #[tokio::test]
    async fn confirm_sets_window_from_plan() {
        let f = fixture();
        let t0 = Utc::now();
        let order = book(&f, Plan::ThreeMonth, t0).await;
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.purchased_at, Some(t0));
        assert_eq!(order.expires_at, Some(t0 + Duration::minutes(10)));
        assert_eq!(order.cost_cents, Some(4000));
    }

    #[tokio::test]
    async fn confirm_twice_is_invalid() {
        let f = fixture();
        let t0 = Utc::now();
        let order = book(&f, Plan::Month, t0).await;
        let err = f
            .service
            .confirm_order(&f.patient.id, &order.order_id, Plan::Month, 4000, t0)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }

    #[tokio::test]
    async fn confirm_someone_elses_cart_is_forbidden() {
        let f = fixture();
        let now = Utc::now();
        let cart = f.service.create_order(&f.patient, &f.therapist, now).await.unwrap();
        let err = f
            .service
            .confirm_order(&ParticipantId::new(), &cart.order_id, Plan::Month, 4000, now)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden(_)));
    }

    #[tokio::test]
    async fn free_trial_is_single_use() {
        let f = fixture();
        let t0 = Utc::now();
        book(&f, Plan::FreeTrial, t0).await;

        let later = t0 + Duration::minutes(4);
        let cart = f.service.create_order(&f.patient, &f.therapist, later).await.unwrap();
        let err = f
            .service
            .confirm_order(&f.patient.id, &cart.order_id, Plan::FreeTrial, 0, later)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(ConflictKind::TrialUsed)));

        // A paid plan still works.
        f.service
            .confirm_order(&f.patient.id, &cart.order_id, Plan::Month, 4000, later)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn refund_revokes_access_for_both_parties() {
        let f = fixture();
        let t0 = Utc::now();
        let order = book(&f, Plan::Year, t0).await;

        let refund_at = t0 + Duration::seconds(30);
        let refunded = f
            .service
            .refund_order(&f.patient, &order.order_id, refund_at)
            .await
            .unwrap();
        assert_eq!(refunded.status, OrderStatus::Refunded);
        assert_eq!(refunded.expires_at, Some(refund_at));

        for who in [f.patient.id, f.therapist] {
            let session = f.service.resolve_active_session(&who, refund_at).await.unwrap();
            assert!(session.is_none());
        }
    }

    #[tokio::test]
    async fn refund_by_stranger_is_forbidden() {
        let f = fixture();
        let order = book(&f, Plan::Month, Utc::now()).await;
        let stranger = Participant {
            id: ParticipantId::new(),
            role: Role::Patient,
        };
        let err = f
            .service
            .refund_order(&stranger, &order.order_id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden(_)));
    }

    #[tokio::test]
    async fn delete_cart_then_rebook() {
        let f = fixture();
        let now = Utc::now();
        f.service.create_order(&f.patient, &f.therapist, now).await.unwrap();
        assert!(f.service.delete_cart(&f.patient.id).await.unwrap());
        assert!(!f.service.delete_cart(&f.patient.id).await.unwrap());
        assert!(f.service.cart(&f.patient.id).await.unwrap().is_none());
        f.service.create_order(&f.patient, &f.therapist, now).await.unwrap();
    }

    #[tokio::test]
    async fn select_plan_requires_cart() {
        let f = fixture();
        let err = f.service.select_plan(&f.patient.id, Plan::Month).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound));

        f.service
            .create_order(&f.patient, &f.therapist, Utc::now())
            .await
            .unwrap();
        let cart = f.service.select_plan(&f.patient.id, Plan::Year).await.unwrap();
        assert_eq!(cart.plan, Some(Plan::Year));
    }

    #[tokio::test]
    async fn available_therapists_hides_busy_and_ranks() {
        let f = fixture();
        let popular = therapist_profile("Pop", "Ular", 40);
        let quiet = therapist_profile("Qui", "Et", 2);
        f.directory.insert(popular.clone());
        f.directory.insert(quiet.clone());

        let t0 = Utc::now();
        book(&f, Plan::Month, t0).await;

        let listed = f.service.available_therapists(t0).await.unwrap();
        let ids: Vec<ParticipantId> = listed.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![popular.id, quiet.id]);

        let after = f
            .service
            .available_therapists(t0 + Duration::minutes(6))
            .await
            .unwrap();
        assert_eq!(after.len(), 3);
    }

    #[tokio::test]
    async fn histories_and_recent_purchase() {
        let f = fixture();
        let t0 = Utc::now();
        let first = book(&f, Plan::Month, t0).await;
        let t1 = t0 + Duration::minutes(10);
        let second = book(&f, Plan::Year, t1).await;
        f.service
            .refund_order(&f.patient, &second.order_id, t1 + Duration::seconds(5))
            .await
            .unwrap();

        let history = f.service.order_history(&f.patient.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].order_id, second.order_id);

        let patients = f.service.patient_history(&f.therapist).await.unwrap();
        assert_eq!(patients.len(), 2);

        let recent = f.service.recent_purchase(&f.patient.id).await.unwrap().unwrap();
        assert_eq!(recent.order_id, first.order_id);
    }
}
