//! HTTP layer for MyMind.
//!
//! Axum-based: the chat page's legacy routes at the root, the booking API
//! at `/api/v1/` with envelope responses, and the chat WebSocket at
//! `/ws/chat`. All routes except `/health` authenticate with a participant
//! token.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
