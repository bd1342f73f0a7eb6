//! Per-order broadcast rooms.
//!
//! Each order id maps to a `tokio::sync::broadcast` channel. Every
//! connection in the room holds a receiver; events carry the originating
//! connection so a sender never sees its own frames echoed back.
//! Rooms are created lazily on first join and released once the last
//! receiver is gone.

use std::fmt;

use dashmap::DashMap;
use mymind_types::chat::ServerFrame;
use mymind_types::order::OrderId;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifies one WebSocket connection (a participant may hold several).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A frame published into a room, tagged with the connection that sent it.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    pub origin: ConnectionId,
    pub frame: ServerFrame,
}

/// Room table keyed by order id.
pub struct RoomBroker {
    rooms: DashMap<OrderId, broadcast::Sender<RoomEvent>>,
    capacity: usize,
}

impl RoomBroker {
    /// Create a broker whose rooms buffer up to `capacity` frames per receiver.
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe `connection` to the room for `order_id`, creating it if needed.
    pub fn join(&self, order_id: &OrderId, connection: ConnectionId) -> RoomSubscription {
        let receiver = self
            .rooms
            .entry(order_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        debug!(%order_id, %connection, "joined room");
        RoomSubscription {
            order_id: order_id.clone(),
            connection,
            receiver,
        }
    }

    /// Publish `frame` to every connection in the room except `origin`.
    ///
    /// Returns the number of receivers the frame was handed to (including
    /// the origin's own, which filters it out on receipt). Publishing to a
    /// room nobody has joined is a no-op.
    pub fn broadcast(&self, order_id: &OrderId, origin: ConnectionId, frame: ServerFrame) -> usize {
        match self.rooms.get(order_id) {
            Some(sender) => sender.send(RoomEvent { origin, frame }).unwrap_or(0),
            None => 0,
        }
    }

    /// Drop the room if no receivers remain.
    pub fn release(&self, order_id: &OrderId) {
        if self
            .rooms
            .remove_if(order_id, |_, sender| sender.receiver_count() == 0)
            .is_some()
        {
            debug!(%order_id, "room released");
        }
    }

    /// Number of rooms currently open.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl fmt::Debug for RoomBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomBroker")
            .field("rooms", &self.rooms.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// One connection's view of a room.
pub struct RoomSubscription {
    order_id: OrderId,
    connection: ConnectionId,
    receiver: broadcast::Receiver<RoomEvent>,
}

impl RoomSubscription {
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Next frame from another connection. `None` once the room is gone.
    ///
    /// A slow receiver that falls behind skips the missed frames and keeps going.
    pub async fn recv(&mut self) -> Option<ServerFrame> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.origin == self.connection => continue,
                Ok(event) => return Some(event.frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        order_id = %self.order_id,
                        connection = %self.connection,
                        skipped,
                        "room receiver lagged, frames dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
