//! Order-confirmation emails.
//!
//! Delivery is an external collaborator behind the [`Notifier`] trait; this
//! module only decides who gets what.

use mymind_types::order::Order;
use mymind_types::participant::UserProfile;
use thiserror::Error;

/// A rendered outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound email transport.
pub trait Notifier: Send + Sync {
    fn send(
        &self,
        email: &Email,
    ) -> impl std::future::Future<Output = Result<(), NotifyError>> + Send;
}

/// Render the patient receipt and the therapist heads-up for a confirmed order.
///
/// Returns `[to_patient, to_therapist]`.
pub fn render_order_confirmed(
    patient: &UserProfile,
    therapist: &UserProfile,
    order: &Order,
    session_minutes: u32,
) -> [Email; 2] {
    let expires = order
        .expires_at
        .map(|t| t.format("%H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "the end of your plan".to_string());

    let to_patient = Email {
        to: patient.email.clone(),
        subject: "Thank you for purchasing a session with MyMind!".to_string(),
        body: format!(
            "We have activated a therapy session with {}. Your session will expire at {expires}, \
             and you can view your order history at any time. Order reference: {}.",
            therapist.full_name(),
            order.order_id,
        ),
    };

    let to_therapist = Email {
        to: therapist.email.clone(),
        subject: "You have a new patient waiting for you!".to_string(),
        body: format!(
            "Your patient, {}, has purchased a session with you for {session_minutes} mins \
             and is waiting to chat. Please get in contact with them as soon as possible.",
            patient.full_name(),
        ),
    };

    [to_patient, to_therapist]
}
