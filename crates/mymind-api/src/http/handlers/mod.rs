//! HTTP request handlers.

pub mod cart;
pub mod chat;
pub mod directory;
pub mod orders;
pub mod ws;
