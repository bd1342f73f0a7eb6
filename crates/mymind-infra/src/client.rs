//! HTTP client for the MyMind server's session endpoint.
//!
//! Implements `EntitlementSource` so the expiry monitor can run against a
//! remote server (`mymind watch`).

use mymind_core::expiry::{EntitlementSource, SourceError};
use mymind_types::chat::{ActiveChatSession, SessionSentinel};
use mymind_types::order::ActiveSession;
use tracing::debug;

/// Polls `GET {base_url}/activeChatSession` with a bearer token.
pub struct HttpSessionSource {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl HttpSessionSource {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mymind-watch/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/activeChatSession", self.base_url)
    }
}

impl EntitlementSource for HttpSessionSource {
    async fn active_session(&self) -> Result<Option<ActiveSession>, SourceError> {
        let response = self
            .http
            .get(self.endpoint())
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SourceError(e.to_string()))?
            .error_for_status()
            .map_err(|e| SourceError(e.to_string()))?;

        let body: ActiveChatSession = response
            .json()
            .await
            .map_err(|e| SourceError(format!("unexpected response: {e}")))?;

        match body {
            ActiveChatSession::Active(info) => Ok(Some(info.session)),
            ActiveChatSession::Sentinel(SessionSentinel::NoActiveSession) => Ok(None),
            ActiveChatSession::Sentinel(SessionSentinel::NotLoggedIn) => {
                debug!("server rejected the watch token");
                Err(SourceError("not logged in: check the token".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let source = HttpSessionSource::new("http://localhost:3000/", "mym_x");
        assert_eq!(source.endpoint(), "http://localhost:3000/activeChatSession");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let source = HttpSessionSource::new("http://127.0.0.1:9", "mym_x");
        assert!(source.active_session().await.is_err());
    }
}
