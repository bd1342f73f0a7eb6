//! Session-scoped chat: room fan-out, persistence port and the per-connection
//! service that ties them to the entitlement ledger.

pub mod broker;
pub mod service;
pub mod store;

pub use broker::{ConnectionId, RoomBroker, RoomSubscription};
pub use service::{ChatConnection, ChatService};
