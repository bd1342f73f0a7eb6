//! WebSocket handler for session-scoped chat rooms.
//!
//! The `/ws/chat` endpoint upgrades an authenticated HTTP connection to a
//! WebSocket. The handler multiplexes two sources in one task:
//!
//! - **Room frames** from the broker (messages, `connected`, `disconnected`)
//!   are forwarded to the client.
//! - **Client frames** (`join_room`, `chat_message`, `check_status`, `ping`)
//!   are dispatched to the chat service; failures come back as `error` frames
//!   and never close the socket.
//!
//! When the socket closes, the connection leaves its room so the counterpart
//! sees `disconnected` once the participant's last tab is gone.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use mymind_core::chat::ChatConnection;
use mymind_types::chat::{ClientFrame, ServerFrame};
use mymind_types::participant::Participant;

use crate::http::extractors::auth::Authenticated;
use crate::state::AppState;

/// Upgrade an HTTP request to a chat WebSocket.
///
/// This is mounted at `/ws/chat` in the router.
pub async fn ws_chat(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_chat_socket(socket, state, caller))
}

/// What woke the connection loop.
enum Inbound {
    Room(Option<ServerFrame>),
    Socket(Option<Result<Message, axum::Error>>),
}

async fn handle_chat_socket(socket: WebSocket, state: AppState, caller: Participant) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut conn = ChatConnection::new(caller.id);
    tracing::debug!(connection = %conn.id(), participant_id = %caller.id, "chat socket opened");

    loop {
        let inbound = tokio::select! {
            frame = conn.next_room_frame() => Inbound::Room(frame),
            msg = ws_receiver.next() => Inbound::Socket(msg),
        };

        match inbound {
            Inbound::Room(Some(frame)) => {
                if send_frame(&mut ws_sender, &frame).await.is_err() {
                    break;
                }
            }
            Inbound::Room(None) => {
                // Room channel closed underneath us; drop back to unjoined.
                state.chat.leave(&mut conn);
            }
            Inbound::Socket(Some(Ok(Message::Text(text)))) => {
                if let Some(reply) = process_frame(&state, &mut conn, text.as_str()).await {
                    if send_frame(&mut ws_sender, &reply).await.is_err() {
                        break;
                    }
                }
            }
            Inbound::Socket(Some(Ok(Message::Close(_)))) | Inbound::Socket(None) => break,
            Inbound::Socket(Some(Err(err))) => {
                tracing::debug!("WebSocket receive error: {err}");
                break;
            }
            // Binary, ping and pong protocol frames are handled by axum.
            Inbound::Socket(Some(Ok(_))) => {}
        }
    }

    state.chat.leave(&mut conn);
    tracing::debug!(connection = %conn.id(), "chat socket closed");
}

/// Parse and dispatch one client frame. Returns the direct reply, if any.
pub(crate) async fn process_frame(
    state: &AppState,
    conn: &mut ChatConnection,
    text: &str,
) -> Option<ServerFrame> {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(raw = %text, error = %err, "Ignoring malformed chat frame");
            return Some(ServerFrame::Error {
                code: "badFrame".to_string(),
                message: err.to_string(),
            });
        }
    };

    let now = chrono::Utc::now();
    let result = match frame {
        ClientFrame::JoinRoom { order_id, sender_id } => {
            state.chat.join_room(conn, order_id, sender_id, now).await
        }
        ClientFrame::ChatMessage { body, order_id } => state
            .chat
            .send_message(conn, &order_id, body, now)
            .await
            .map(|_| ()),
        ClientFrame::CheckStatus {
            counterpart_id,
            request_id,
        } => return state.chat.check_status(conn, &counterpart_id, request_id),
        ClientFrame::Ping => return Some(ServerFrame::Pong),
    };

    result.err().map(|err| {
        tracing::info!(connection = %conn.id(), code = err.code(), "chat request rejected: {err}");
        ServerFrame::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    })
}

async fn send_frame(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(json) => ws_sender.send(Message::Text(json.into())).await,
        Err(err) => {
            tracing::warn!("Failed to serialize ServerFrame: {err}");
            Ok(())
        }
    }
}
