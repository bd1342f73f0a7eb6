//! Session expiry monitor.
//!
//! Polls an [`EntitlementSource`] on a fixed interval, renders the time left
//! in the paid window and locks the chat once it lapses. The monitor is a
//! small state machine:
//!
//! ```text
//! Pending --no session--> Hidden --session--> Counting --lapsed--> Ended
//!    \______________________session_____________^
//! ```
//!
//! `Ended` is terminal and reached at most once, so the view's lock side
//! effect never fires twice. `Hidden` means no session was seen yet; it is
//! distinct from `Ended`, which only follows a session that was live during
//! this monitor's lifetime.

use std::time::Duration;

use chrono::{DateTime, Utc};
use mymind_types::order::{ActiveSession, OrderId};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
#[error("entitlement lookup failed: {0}")]
pub struct SourceError(pub String);

/// Where the monitor reads the current entitlement from.
pub trait EntitlementSource: Send + Sync {
    fn active_session(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<ActiveSession>, SourceError>> + Send;
}

/// Presentation hooks driven by the monitor.
pub trait ExpiryView: Send {
    /// No session: hide the chat affordance.
    fn hide_chat(&mut self);

    /// Session live: show the countdown text.
    fn show_remaining(&mut self, text: &str);

    /// Session lapsed: disable input, gray out send, show the ended modal.
    fn lock_ended(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorState {
    Pending,
    Hidden,
    Counting {
        order_id: OrderId,
        expires_at: DateTime<Utc>,
    },
    Ended,
}

impl MonitorState {
    pub fn is_ended(&self) -> bool {
        matches!(self, MonitorState::Ended)
    }
}

/// Render remaining time as `"{h}h {m}m {s}s"`, `"{m}m {s}s"` or `"{s}s"`.
///
/// Negative durations render as `"0s"`.
pub fn format_remaining(remaining: chrono::Duration) -> String {
    let total = remaining.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

pub struct ExpiryMonitor<S: EntitlementSource, V: ExpiryView> {
    source: S,
    view: V,
    state: MonitorState,
    interval: Duration,
    cancel: CancellationToken,
}

impl<S: EntitlementSource, V: ExpiryView> ExpiryMonitor<S, V> {
    pub fn new(source: S, view: V, interval: Duration) -> Self {
        Self {
            source,
            view,
            state: MonitorState::Pending,
            interval: interval.max(Duration::from_millis(1)),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Advance the state machine with an observed entitlement.
    pub fn apply(&mut self, session: Option<&ActiveSession>, now: DateTime<Utc>) -> &MonitorState {
        if self.state.is_ended() {
            return &self.state;
        }

        let live = session.filter(|s| s.expires_at > now);
        match (live, &self.state) {
            (Some(session), _) => {
                self.view
                    .show_remaining(&format_remaining(session.remaining(now)));
                if !matches!(&self.state, MonitorState::Counting { order_id, .. } if *order_id == session.order_id)
                {
                    debug!(order_id = %session.order_id, "session countdown started");
                }
                self.state = MonitorState::Counting {
                    order_id: session.order_id.clone(),
                    expires_at: session.expires_at,
                };
            }
            (None, MonitorState::Counting { order_id, .. }) => {
                info!(%order_id, "session ended");
                self.view.lock_ended();
                self.state = MonitorState::Ended;
            }
            (None, MonitorState::Pending) => {
                self.view.hide_chat();
                self.state = MonitorState::Hidden;
            }
            (None, _) => {}
        }
        &self.state
    }

    /// Fetch entitlement once and apply it. Lookup failures leave the state untouched.
    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> &MonitorState {
        match self.source.active_session().await {
            Ok(session) => self.apply(session.as_ref(), now),
            Err(e) => {
                warn!(error = %e, "expiry poll failed");
                &self.state
            }
        }
    }

    /// Poll until the session ends or the cancel token fires.
    pub async fn run(mut self) -> (MonitorState, V) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("expiry monitor cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if self.poll_once(Utc::now()).await.is_ended() {
                        break;
                    }
                }
            }
        }
        (self.state, self.view)
    }
}
