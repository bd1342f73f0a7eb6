//! Query parameter extractors.

use serde::Deserialize;

/// `?token=...`, accepted where browsers cannot set an `Authorization`
/// header (WebSocket upgrades).
#[derive(Debug, Deserialize, Default)]
pub struct TokenQuery {
    pub token: Option<String>,
}
