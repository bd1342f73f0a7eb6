//! Default email transport: write the rendered message to the log.
//!
//! Real SMTP delivery is out of scope; deployments that need it supply their
//! own `Notifier`.

use mymind_core::effects::notify::{Email, Notifier, NotifyError};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        if email.to.trim().is_empty() {
            return Err(NotifyError("missing recipient".to_string()));
        }
        info!(to = %email.to, subject = %email.subject, body = %email.body, "email sent");
        Ok(())
    }
}
