//! Background worker draining the side-effect queue.
//!
//! Each effect is attempted up to `max_attempts` times with exponential
//! backoff. Failures after the last attempt are logged and dropped; nothing
//! is persisted for later replay.

use std::time::Duration;

use mymind_types::config::{EffectsConfig, PlanConfig};
use mymind_types::error::RepositoryError;
use mymind_types::order::Order;
use mymind_types::participant::{ParticipantId, UserProfile};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::notify::{render_order_confirmed, Notifier, NotifyError};
use super::SideEffect;
use crate::repository::directory::UserDirectory;

/// Errors from handling a single side effect.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("directory error: {0}")]
    Directory(#[from] RepositoryError),

    #[error("unknown user {0}")]
    UnknownUser(ParticipantId),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Executes one side effect.
pub trait EffectHandler: Send + Sync {
    fn handle(
        &self,
        effect: &SideEffect,
    ) -> impl std::future::Future<Output = Result<(), EffectError>> + Send;
}

/// Retry policy: bounded attempts, doubling delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EffectsConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exp)
    }
}

/// Production handler: counters go to the user directory, emails to the notifier.
pub struct DirectoryEffects<U: UserDirectory, N: Notifier> {
    directory: U,
    notifier: N,
    plans: PlanConfig,
}

impl<U: UserDirectory, N: Notifier> DirectoryEffects<U, N> {
    pub fn new(directory: U, notifier: N, plans: PlanConfig) -> Self {
        Self {
            directory,
            notifier,
            plans,
        }
    }

    async fn profile(
        &self,
        id: &ParticipantId,
    ) -> Result<UserProfile, EffectError> {
        self.directory
            .get_user(id)
            .await?
            .ok_or(EffectError::UnknownUser(*id))
    }

    /// Send one of the two confirmation emails for `order`.
    async fn notify(&self, order: &Order, to_therapist: bool) -> Result<(), EffectError> {
        let patient = self.profile(&order.patient_id).await?;
        let therapist = self.profile(&order.therapist_id).await?;
        let minutes = order.plan.map(|p| self.plans.minutes(p)).unwrap_or(0);
        let [to_patient, to_therapist_email] =
            render_order_confirmed(&patient, &therapist, order, minutes);
        let email = if to_therapist { to_therapist_email } else { to_patient };
        self.notifier.send(&email).await?;
        info!(order_id = %order.order_id, to = %email.to, "confirmation email sent");
        Ok(())
    }
}

impl<U: UserDirectory, N: Notifier> EffectHandler for DirectoryEffects<U, N> {
    async fn handle(&self, effect: &SideEffect) -> Result<(), EffectError> {
        match effect {
            SideEffect::IncrementTherapistSessions { therapist_id } => {
                self.directory.increment_sessions(therapist_id).await?;
                debug!(%therapist_id, "therapist session counter incremented");
            }
            SideEffect::NotifyPatient { order } => self.notify(order, false).await?,
            SideEffect::NotifyTherapist { order } => self.notify(order, true).await?,
        }
        Ok(())
    }
}

/// Drains the side-effect queue until cancelled or the queue closes.
pub struct EffectWorker<H: EffectHandler> {
    handler: H,
    policy: RetryPolicy,
}

impl<H: EffectHandler> EffectWorker<H> {
    pub fn new(handler: H, policy: RetryPolicy) -> Self {
        Self { handler, policy }
    }

    /// Run until `cancel` fires or every producer is dropped.
    pub async fn run(self, mut receiver: mpsc::Receiver<SideEffect>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("side-effect worker cancelled");
                    break;
                }
                next = receiver.recv() => match next {
                    Some(effect) => {
                        self.process(&effect).await;
                    }
                    None => {
                        debug!("side-effect queue closed");
                        break;
                    }
                },
            }
        }
    }

    /// Attempt one effect under the retry policy. Returns `true` on success.
    pub async fn process(&self, effect: &SideEffect) -> bool {
        let mut attempt = 1;
        loop {
            match self.handler.handle(effect).await {
                Ok(()) => return true,
                Err(err) if self.policy.should_retry(attempt) => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        effect = effect.kind(),
                        attempt,
                        error = %err,
                        "side effect failed, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        effect = effect.kind(),
                        attempt,
                        error = %err,
                        "side effect failed, giving up"
                    );
                    return false;
                }
            }
        }
    }
}
