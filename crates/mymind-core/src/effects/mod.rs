//! Deferred side effects of order confirmation.
//!
//! Confirming an order must not wait on email delivery or counter updates.
//! The ledger pushes a [`SideEffect`] onto an [`EffectQueue`]; an
//! [`worker::EffectWorker`] drains it in the background with its own retry
//! policy.

pub mod notify;
pub mod worker;

use mymind_types::order::Order;
use mymind_types::participant::ParticipantId;
use tokio::sync::mpsc;
use tracing::warn;

/// Work handed off from the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Bump the therapist's completed-session counter (listing rank).
    IncrementTherapistSessions { therapist_id: ParticipantId },
    /// Email the patient their receipt.
    NotifyPatient { order: Order },
    /// Email the therapist that a patient is waiting.
    NotifyTherapist { order: Order },
}

impl SideEffect {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SideEffect::IncrementTherapistSessions { .. } => "increment_sessions",
            SideEffect::NotifyPatient { .. } => "notify_patient",
            SideEffect::NotifyTherapist { .. } => "notify_therapist",
        }
    }
}

/// Producer handle for the side-effect queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EffectQueue {
    sender: mpsc::Sender<SideEffect>,
}

impl EffectQueue {
    /// Create a bounded queue, returning the producer and the worker's receiver.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SideEffect>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueue without waiting. Returns `false` if the effect was dropped
    /// because the queue is full or the worker has stopped.
    pub fn enqueue(&self, effect: SideEffect) -> bool {
        let kind = effect.kind();
        match self.sender.try_send(effect) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(effect = kind, "side-effect queue full, dropping effect");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(effect = kind, "side-effect worker stopped, dropping effect");
                false
            }
        }
    }
}
