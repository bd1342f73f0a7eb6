//! Chat service: room membership, message relay and presence queries.
//!
//! One [`ChatConnection`] exists per WebSocket. The service checks every
//! join against the order ledger, so a connection can only enter the room of
//! a live order its participant is a party to. Messages are persisted before
//! relay, but a failed write never blocks delivery.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mymind_types::chat::{ChatMessage, ServerFrame};
use mymind_types::error::ChatError;
use mymind_types::order::{Order, OrderId};
use mymind_types::participant::{Participant, ParticipantId, Role};
use tracing::{debug, error, info};

use super::broker::{ConnectionId, RoomBroker, RoomSubscription};
use super::store::MessageStore;
use crate::presence::PresenceRegistry;
use crate::repository::order::OrderRepository;

struct JoinedRoom {
    order_id: OrderId,
    counterpart_id: ParticipantId,
    subscription: RoomSubscription,
}

/// Per-socket chat state.
pub struct ChatConnection {
    id: ConnectionId,
    participant: ParticipantId,
    room: Option<JoinedRoom>,
}

impl ChatConnection {
    pub fn new(participant: ParticipantId) -> Self {
        Self {
            id: ConnectionId::new(),
            participant,
            room: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    /// The order whose room this connection is in, if any.
    pub fn order_id(&self) -> Option<&OrderId> {
        self.room.as_ref().map(|r| &r.order_id)
    }

    /// Wait for the next frame from the room.
    ///
    /// Never resolves while the connection has not joined a room.
    pub async fn next_room_frame(&mut self) -> Option<ServerFrame> {
        match self.room.as_mut() {
            Some(room) => room.subscription.recv().await,
            None => std::future::pending().await,
        }
    }
}

/// Orchestrates chat rooms on top of the order ledger and message store.
pub struct ChatService<O: OrderRepository, M: MessageStore, P: PresenceRegistry> {
    orders: O,
    messages: M,
    presence: Arc<P>,
    broker: RoomBroker,
}

impl<O: OrderRepository, M: MessageStore, P: PresenceRegistry> ChatService<O, M, P> {
    pub fn new(orders: O, messages: M, presence: Arc<P>, room_capacity: usize) -> Self {
        Self {
            orders,
            messages,
            presence,
            broker: RoomBroker::new(room_capacity),
        }
    }

    pub fn presence(&self) -> &P {
        &self.presence
    }

    pub fn broker(&self) -> &RoomBroker {
        &self.broker
    }

    async fn live_order(&self, order_id: &OrderId, now: DateTime<Utc>) -> Result<Option<Order>, ChatError> {
        let order = self
            .orders
            .get_order(order_id)
            .await
            .map_err(|e| ChatError::Storage(e.to_string()))?;
        Ok(order.filter(|o| o.is_live(now)))
    }

    /// Attach `conn` to the room for `order_id`.
    ///
    /// `sender_id` must be the authenticated participant and the order must
    /// be live and involve them. Re-joining the current room is a no-op;
    /// joining a second room leaves the first.
    pub async fn join_room(
        &self,
        conn: &mut ChatConnection,
        order_id: OrderId,
        sender_id: ParticipantId,
        now: DateTime<Utc>,
    ) -> Result<(), ChatError> {
        if sender_id != conn.participant {
            return Err(ChatError::SenderMismatch);
        }
        let order = self
            .live_order(&order_id, now)
            .await?
            .filter(|o| o.involves(&sender_id))
            .ok_or_else(|| ChatError::NotEntitled(order_id.to_string()))?;
        let counterpart_id = order
            .counterpart_of(&sender_id)
            .ok_or_else(|| ChatError::NotEntitled(order_id.to_string()))?;

        if conn.order_id() == Some(&order_id) {
            debug!(%order_id, connection = %conn.id, "already in room");
            return Ok(());
        }

        // Count the new room before leaving the old one so presence never
        // passes through zero on a switch.
        self.presence.mark_connected(&sender_id);
        if conn.room.is_some() {
            self.leave(conn);
        }

        let subscription = self.broker.join(&order_id, conn.id);
        self.broker
            .broadcast(&order_id, conn.id, ServerFrame::Connected { sender_id });

        info!(%order_id, participant_id = %sender_id, connection = %conn.id, "participant joined room");
        conn.room = Some(JoinedRoom {
            order_id,
            counterpart_id,
            subscription,
        });
        Ok(())
    }

    /// Store `body` and relay it to the rest of the room.
    ///
    /// The order is re-checked on every message so a refund or lapse cuts
    /// the conversation off even while the socket stays open.
    pub async fn send_message(
        &self,
        conn: &ChatConnection,
        order_id: &OrderId,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage, ChatError> {
        let room = conn.room.as_ref().ok_or(ChatError::NotJoined)?;
        if room.order_id != *order_id {
            return Err(ChatError::NotEntitled(order_id.to_string()));
        }
        if self.live_order(order_id, now).await?.is_none() {
            return Err(ChatError::SessionEnded);
        }

        let message = ChatMessage::new(order_id.clone(), conn.participant, body, now);
        if let Err(e) = self.messages.append(&message).await {
            error!(%order_id, message_id = %message.id, error = %e, "failed to persist chat message");
        }

        self.broker.broadcast(
            order_id,
            conn.id,
            ServerFrame::ChatMessage {
                message: message.body.clone(),
            },
        );
        debug!(%order_id, sender_id = %conn.participant, "message relayed");
        Ok(message)
    }

    /// One-shot presence query for the joined room's counterpart.
    ///
    /// Returns a `status` frame only when the counterpart is online; asking
    /// about anyone else yields nothing.
    pub fn check_status(
        &self,
        conn: &ChatConnection,
        counterpart_id: &ParticipantId,
        request_id: u64,
    ) -> Option<ServerFrame> {
        let room = conn.room.as_ref()?;
        if room.counterpart_id != *counterpart_id || !self.presence.is_connected(counterpart_id) {
            return None;
        }
        Some(ServerFrame::Status {
            counterpart_id: *counterpart_id,
            request_id,
            online: true,
        })
    }

    /// Detach `conn` from its room. Safe to call repeatedly.
    ///
    /// When this was the participant's last connection, the room is told
    /// `disconnected`.
    pub fn leave(&self, conn: &mut ChatConnection) {
        let Some(room) = conn.room.take() else {
            return;
        };
        let JoinedRoom {
            order_id,
            subscription,
            ..
        } = room;
        drop(subscription);

        if self.presence.mark_disconnected(&conn.participant) {
            self.broker
                .broadcast(&order_id, conn.id, ServerFrame::Disconnected);
            info!(%order_id, participant_id = %conn.participant, "participant left room");
        }
        self.broker.release(&order_id);
    }

    /// Full conversation for an order, oldest first.
    ///
    /// Parties to the order may read it at any time, including after expiry.
    pub async fn history(&self, caller: &Participant, order_id: &OrderId) -> Result<Vec<ChatMessage>, ChatError> {
        let order = self
            .orders
            .get_order(order_id)
            .await
            .map_err(|e| ChatError::Storage(e.to_string()))?
            .ok_or_else(|| ChatError::NotEntitled(order_id.to_string()))?;
        if caller.role != Role::Admin && !order.involves(&caller.id) {
            return Err(ChatError::NotEntitled(order_id.to_string()));
        }
        self.messages
            .list_by_order(order_id)
            .await
            .map_err(|e| ChatError::Storage(e.to_string()))
    }
}
