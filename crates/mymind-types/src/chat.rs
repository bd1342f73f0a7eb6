//! Chat message and WebSocket frame types.
//!
//! `ChatMessage` is the persisted record. `ClientFrame` / `ServerFrame` are
//! the JSON text frames exchanged on `/ws/chat`, tagged by `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::order::{ActiveSession, OrderId};
use crate::participant::ParticipantId;

/// A single chat message within an order's conversation.
///
/// Immutable once created. Ordered by `created_at` within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub order_id: OrderId,
    pub sender_id: ParticipantId,
    /// Serialized as `message` to match the relay payload.
    #[serde(rename = "message")]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(order_id: OrderId, sender_id: ParticipantId, body: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            order_id,
            sender_id,
            body,
            created_at,
        }
    }
}

/// Frame sent by a chat client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Attach this connection to the room named by `order_id`.
    JoinRoom {
        order_id: OrderId,
        sender_id: ParticipantId,
    },
    /// Send `body` to the counterpart in `order_id`.
    ChatMessage { body: String, order_id: OrderId },
    /// Ask whether the counterpart is online. Answered only if they are.
    CheckStatus {
        counterpart_id: ParticipantId,
        #[serde(default)]
        request_id: u64,
    },
    /// Keep-alive ping. Server responds with `{"type":"pong"}`.
    Ping,
}

/// Frame pushed to a chat client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A message relayed from the counterpart.
    ChatMessage { message: String },
    /// Someone joined the room; clients compare against their own id.
    Connected { sender_id: ParticipantId },
    /// The counterpart's last connection closed.
    Disconnected,
    /// Answer to `check_status`; only ever sent with `online: true`.
    Status {
        counterpart_id: ParticipantId,
        request_id: u64,
        online: bool,
    },
    Error { code: String, message: String },
    Pong,
}

/// Body of `GET /activeChatSession`: the caller's live session decorated
/// with the counterpart's contact details for the chat header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionInfo {
    #[serde(flatten)]
    pub session: ActiveSession,
    pub counterpart_name: String,
    pub counterpart_phone: Option<String>,
    pub counterpart_img: Option<String>,
}

/// Why `/activeChatSession` has no session to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionSentinel {
    NoActiveSession,
    #[serde(rename = "notLoggedIn")]
    NotLoggedIn,
}

/// Either a session object or one of the bare JSON strings
/// `"NoActiveSession"` / `"notLoggedIn"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActiveChatSession {
    Active(Box<ChatSessionInfo>),
    Sentinel(SessionSentinel),
}
