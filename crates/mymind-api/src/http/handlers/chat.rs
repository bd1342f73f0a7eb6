//! Chat session handlers.
//!
//! These two routes keep the bare response shapes the chat page consumes
//! (no envelope): `/activeChatSession` answers with either the session info
//! object or one of the strings `"NoActiveSession"` / `"notLoggedIn"`.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use mymind_core::repository::directory::UserDirectory;
use mymind_types::chat::{ActiveChatSession, ChatMessage, ChatSessionInfo, SessionSentinel};
use mymind_types::order::OrderId;

use crate::http::error::AppError;
use crate::http::extractors::auth::{Authenticated, MaybeAuthenticated};
use crate::state::AppState;

/// GET /activeChatSession - Resolve the caller's live session, if any.
pub async fn active_chat_session(
    State(state): State<AppState>,
    MaybeAuthenticated(caller): MaybeAuthenticated,
) -> Result<Json<ActiveChatSession>, AppError> {
    let Some(caller) = caller else {
        return Ok(Json(ActiveChatSession::Sentinel(SessionSentinel::NotLoggedIn)));
    };

    let session = state
        .ledger
        .resolve_active_session(&caller.id, chrono::Utc::now())
        .await?;
    let Some(session) = session else {
        return Ok(Json(ActiveChatSession::Sentinel(SessionSentinel::NoActiveSession)));
    };

    let counterpart = state.users.get_user(&session.counterpart_id).await?;
    let info = match counterpart {
        Some(profile) => ChatSessionInfo {
            counterpart_name: profile.full_name(),
            counterpart_phone: profile.phone_num,
            counterpart_img: profile.profile_img,
            session,
        },
        None => {
            tracing::warn!(counterpart_id = %session.counterpart_id, "counterpart missing from directory");
            ChatSessionInfo {
                counterpart_name: String::new(),
                counterpart_phone: None,
                counterpart_img: None,
                session,
            }
        }
    };

    Ok(Json(ActiveChatSession::Active(Box::new(info))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadMessagesRequest {
    pub order_id: OrderId,
}

/// POST /loadMsgs - Full conversation for an order, oldest first.
pub async fn load_messages(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(body): Json<LoadMessagesRequest>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let messages = state.chat.history(&caller, &body.order_id).await?;
    Ok(Json(messages))
}
