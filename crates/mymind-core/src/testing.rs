//! In-memory implementations of the core ports, shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use mymind_types::chat::ChatMessage;
use mymind_types::error::{ConflictKind, LedgerError, RepositoryError};
use mymind_types::order::{Order, OrderId, OrderStatus, Plan};
use mymind_types::participant::{ParticipantId, Role, UserProfile};

use crate::chat::store::MessageStore;
use crate::repository::directory::UserDirectory;
use crate::repository::order::{Confirmation, OrderRepository};

pub fn patient_profile(first: &str, last: &str) -> UserProfile {
    UserProfile {
        id: ParticipantId::new(),
        role: Role::Patient,
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!("{}@example.com", first.to_lowercase()),
        phone_num: Some("555-0100".to_string()),
        profile_img: None,
        years_experience: None,
        session_cost_cents: None,
        num_sessions: 0,
        used_trial: false,
    }
}

pub fn therapist_profile(first: &str, last: &str, num_sessions: u32) -> UserProfile {
    UserProfile {
        id: ParticipantId::new(),
        role: Role::Therapist,
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!("{}@example.com", first.to_lowercase()),
        phone_num: Some("555-0199".to_string()),
        profile_img: Some("/uploads/therapist.png".to_string()),
        years_experience: Some(8),
        session_cost_cents: Some(4000),
        num_sessions,
        used_trial: false,
    }
}

#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    users: Arc<Mutex<HashMap<ParticipantId, UserProfile>>>,
}

impl InMemoryDirectory {
    pub fn insert(&self, profile: UserProfile) {
        self.users.lock().unwrap().insert(profile.id, profile);
    }

    pub fn num_sessions(&self, id: &ParticipantId) -> u32 {
        self.users
            .lock()
            .unwrap()
            .get(id)
            .map(|u| u.num_sessions)
            .unwrap_or(0)
    }
}

impl UserDirectory for InMemoryDirectory {
    async fn get_user(&self, id: &ParticipantId) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn list_therapists(&self) -> Result<Vec<UserProfile>, RepositoryError> {
        let mut therapists: Vec<UserProfile> = self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.role == Role::Therapist)
            .cloned()
            .collect();
        therapists.sort_by(|a, b| b.num_sessions.cmp(&a.num_sessions));
        Ok(therapists)
    }

    async fn increment_sessions(&self, therapist_id: &ParticipantId) -> Result<(), RepositoryError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(therapist_id).ok_or(RepositoryError::NotFound)?;
        user.num_sessions += 1;
        Ok(())
    }
}

/// Order storage guarded by a single mutex, so check-and-write is atomic.
#[derive(Default, Clone)]
pub struct InMemoryOrders {
    orders: Arc<Mutex<Vec<Order>>>,
    trials_used: Arc<Mutex<HashSet<ParticipantId>>>,
}

impl InMemoryOrders {
    pub fn all(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }

    pub fn put(&self, order: Order) {
        self.orders.lock().unwrap().push(order);
    }
}

fn history(orders: &[Order], pred: impl Fn(&Order) -> bool) -> Vec<Order> {
    let mut out: Vec<Order> = orders
        .iter()
        .filter(|o| matches!(o.status, OrderStatus::Completed | OrderStatus::Refunded))
        .filter(|o| pred(o))
        .cloned()
        .collect();
    out.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
    out
}

impl OrderRepository for InMemoryOrders {
    async fn insert_cart(&self, order: &Order, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let mut orders = self.orders.lock().unwrap();
        if orders
            .iter()
            .any(|o| o.patient_id == order.patient_id && o.status == OrderStatus::Active)
        {
            return Err(LedgerError::Conflict(ConflictKind::CartExists));
        }
        if orders
            .iter()
            .any(|o| o.patient_id == order.patient_id && o.is_live(now))
        {
            return Err(LedgerError::Conflict(ConflictKind::OrderExists));
        }
        if orders
            .iter()
            .any(|o| o.therapist_id == order.therapist_id && o.is_live(now))
        {
            return Err(LedgerError::Conflict(ConflictKind::TherapistBusy));
        }
        orders.push(order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.order_id == *order_id)
            .cloned())
    }

    async fn active_cart(&self, patient_id: &ParticipantId) -> Result<Option<Order>, LedgerError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.patient_id == *patient_id && o.status == OrderStatus::Active)
            .cloned())
    }

    async fn set_cart_plan(&self, patient_id: &ParticipantId, plan: Plan) -> Result<Order, LedgerError> {
        let mut orders = self.orders.lock().unwrap();
        let cart = orders
            .iter_mut()
            .find(|o| o.patient_id == *patient_id && o.status == OrderStatus::Active)
            .ok_or(LedgerError::NotFound)?;
        cart.plan = Some(plan);
        Ok(cart.clone())
    }

    async fn delete_cart(&self, patient_id: &ParticipantId) -> Result<bool, LedgerError> {
        let mut orders = self.orders.lock().unwrap();
        match orders
            .iter_mut()
            .find(|o| o.patient_id == *patient_id && o.status == OrderStatus::Active)
        {
            Some(cart) => {
                cart.status = OrderStatus::Deleted;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn confirm(&self, order_id: &OrderId, confirmation: &Confirmation) -> Result<Order, LedgerError> {
        let mut orders = self.orders.lock().unwrap();
        let idx = orders
            .iter()
            .position(|o| o.order_id == *order_id)
            .ok_or(LedgerError::NotFound)?;
        if orders[idx].status != OrderStatus::Active {
            return Err(LedgerError::InvalidState(format!(
                "order is {}",
                orders[idx].status
            )));
        }
        let therapist_id = orders[idx].therapist_id;
        if orders
            .iter()
            .any(|o| o.therapist_id == therapist_id && o.is_live(confirmation.purchased_at))
        {
            return Err(LedgerError::Conflict(ConflictKind::TherapistBusy));
        }
        if confirmation.plan.is_trial() {
            let mut trials = self.trials_used.lock().unwrap();
            if !trials.insert(orders[idx].patient_id) {
                return Err(LedgerError::Conflict(ConflictKind::TrialUsed));
            }
        }
        let order = &mut orders[idx];
        order.status = OrderStatus::Completed;
        order.plan = Some(confirmation.plan);
        order.cost_cents = Some(confirmation.cost_cents);
        order.purchased_at = Some(confirmation.purchased_at);
        order.expires_at = Some(confirmation.expires_at);
        Ok(order.clone())
    }

    async fn refund(&self, order_id: &OrderId, now: DateTime<Utc>) -> Result<Order, LedgerError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|o| o.order_id == *order_id)
            .ok_or(LedgerError::NotFound)?;
        if !order.is_live(now) {
            return Err(LedgerError::InvalidState("order is not live".to_string()));
        }
        order.status = OrderStatus::Refunded;
        order.expires_at = Some(now);
        Ok(order.clone())
    }

    async fn find_live_order(
        &self,
        participant_id: &ParticipantId,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, LedgerError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.involves(participant_id) && o.is_live(now))
            .max_by_key(|o| o.purchased_at)
            .cloned())
    }

    async fn busy_therapists(&self, now: DateTime<Utc>) -> Result<HashSet<ParticipantId>, LedgerError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.is_live(now))
            .map(|o| o.therapist_id)
            .collect())
    }

    async fn patient_history(&self, patient_id: &ParticipantId) -> Result<Vec<Order>, LedgerError> {
        Ok(history(&self.orders.lock().unwrap(), |o| {
            o.patient_id == *patient_id
        }))
    }

    async fn therapist_history(&self, therapist_id: &ParticipantId) -> Result<Vec<Order>, LedgerError> {
        Ok(history(&self.orders.lock().unwrap(), |o| {
            o.therapist_id == *therapist_id
        }))
    }
}

/// Message store with a switch to simulate write failures.
#[derive(Default, Clone)]
pub struct InMemoryMessages {
    messages: Arc<Mutex<Vec<ChatMessage>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryMessages {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

impl MessageStore for InMemoryMessages {
    async fn append(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("disk full".to_string()));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn list_by_order(&self, order_id: &OrderId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let mut out: Vec<ChatMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.order_id == *order_id)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.created_at);
        Ok(out)
    }
}
