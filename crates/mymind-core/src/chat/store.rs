//! Message store trait definition.
//!
//! Uses native async fn in traits (Rust 2024 edition, no async_trait macro).

use mymind_types::chat::ChatMessage;
use mymind_types::error::RepositoryError;
use mymind_types::order::OrderId;

/// Durable, append-only chat history keyed by order.
pub trait MessageStore: Send + Sync {
    /// Persist one message. Callers log failures; delivery does not depend on it.
    fn append(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All messages for an order, oldest first.
    fn list_by_order(
        &self,
        order_id: &OrderId,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;
}
