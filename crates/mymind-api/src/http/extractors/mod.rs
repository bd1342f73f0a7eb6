//! Request extractors shared by the REST and WebSocket handlers.

pub mod auth;
pub mod query;
