//! Order types: the booked, time-bounded session that entitles a patient
//! and a therapist to chat.
//!
//! An order starts life as the patient's cart (`Active`), becomes a paid
//! session on confirmation (`Completed`, with an expiry), and may end up
//! `Deleted` (cart abandoned) or `Refunded` (access revoked early).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::participant::ParticipantId;

/// Lowest order number handed out (inclusive).
const ORDER_NUMBER_BASE: u128 = 1_000_000_000;

/// Width of the order number range.
const ORDER_NUMBER_SPAN: u128 = 1_500_000_000;

/// Opaque order token such as `MM1234567890`. Doubles as the chat room name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generate a fresh `MM`-prefixed order number from random bits.
    ///
    /// Uniqueness is enforced by the primary key.
    pub fn generate() -> Self {
        let n = Uuid::new_v4().as_u128() % ORDER_NUMBER_SPAN + ORDER_NUMBER_BASE;
        Self(format!("MM{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of an order.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (status IN ('active', 'completed', 'deleted', 'refunded'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// In the cart, not yet paid.
    Active,
    /// Paid; chat-eligible until `expires_at`.
    Completed,
    /// Cart abandoned by the patient.
    Deleted,
    /// Paid, then refunded; access revoked.
    Refunded,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Active => write!(f, "active"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Deleted => write!(f, "deleted"),
            OrderStatus::Refunded => write!(f, "refunded"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(OrderStatus::Active),
            "completed" => Ok(OrderStatus::Completed),
            "deleted" => Ok(OrderStatus::Deleted),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(format!("invalid order status: '{other}'")),
        }
    }
}

/// Purchasable plan. Each maps to a session length in the plan catalog
/// (see `config::PlanConfig`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plan {
    #[serde(rename = "freePlan")]
    FreeTrial,
    #[serde(rename = "monthPlan")]
    Month,
    #[serde(rename = "threeMonthPlan")]
    ThreeMonth,
    #[serde(rename = "yearPlan")]
    Year,
}

impl Plan {
    pub fn is_trial(&self) -> bool {
        matches!(self, Plan::FreeTrial)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::FreeTrial => write!(f, "freePlan"),
            Plan::Month => write!(f, "monthPlan"),
            Plan::ThreeMonth => write!(f, "threeMonthPlan"),
            Plan::Year => write!(f, "yearPlan"),
        }
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "freePlan" => Ok(Plan::FreeTrial),
            "monthPlan" => Ok(Plan::Month),
            "threeMonthPlan" => Ok(Plan::ThreeMonth),
            "yearPlan" => Ok(Plan::Year),
            other => Err(format!("invalid plan: '{other}'")),
        }
    }
}

/// A booked session between one patient and one therapist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    pub patient_id: ParticipantId,
    pub therapist_id: ParticipantId,
    pub status: OrderStatus,
    /// Selected while in the cart; fixed at confirmation.
    pub plan: Option<Plan>,
    pub cost_cents: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub purchased_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether this order currently grants chat access.
    ///
    /// Expiry is computed on read: a completed order is live strictly
    /// before its `expires_at`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Completed && self.expires_at.is_some_and(|exp| exp > now)
    }

    /// Whether the participant is one of the two parties of this order.
    pub fn involves(&self, participant: &ParticipantId) -> bool {
        self.patient_id == *participant || self.therapist_id == *participant
    }

    /// The other party, or `None` if `participant` is not on this order.
    pub fn counterpart_of(&self, participant: &ParticipantId) -> Option<ParticipantId> {
        if self.patient_id == *participant {
            Some(self.therapist_id)
        } else if self.therapist_id == *participant {
            Some(self.patient_id)
        } else {
            None
        }
    }
}

/// Which side of an order a participant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    Patient,
    Therapist,
}

/// Resolved chat entitlement for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub order_id: OrderId,
    pub counterpart_id: ParticipantId,
    pub expires_at: DateTime<Utc>,
    pub role: SessionRole,
}

impl ActiveSession {
    /// Build the entitlement view of `order` for `participant`.
    ///
    /// Returns `None` if the order is not live or the participant is not a party to it.
    pub fn from_order(order: &Order, participant: &ParticipantId, now: DateTime<Utc>) -> Option<Self> {
        if !order.is_live(now) {
            return None;
        }
        let counterpart_id = order.counterpart_of(participant)?;
        let role = if order.patient_id == *participant {
            SessionRole::Patient
        } else {
            SessionRole::Therapist
        };
        Some(Self {
            order_id: order.order_id.clone(),
            counterpart_id,
            expires_at: order.expires_at?,
            role,
        })
    }

    /// Time left in the paid window; negative once lapsed.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }
}
