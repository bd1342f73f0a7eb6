//! Shared domain types for MyMind.
//!
//! This crate contains the core domain types used across the MyMind platform:
//! participants, orders (the chat entitlement unit), chat messages and the
//! WebSocket wire frames, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod order;
pub mod participant;
