//! Infrastructure layer for MyMind.
//!
//! Contains implementations of the ports defined in `mymind-core`: SQLite
//! storage for orders, users, tokens and chat history, the config loader,
//! the default email transport, and the HTTP session source used by the
//! terminal expiry monitor.

pub mod client;
pub mod config;
pub mod data_dir;
pub mod mailer;
pub mod sqlite;
