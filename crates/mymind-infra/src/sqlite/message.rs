//! SQLite chat message store.
//!
//! Append-only: messages are inserted once and never updated or deleted.

use mymind_core::chat::store::MessageStore;
use mymind_types::chat::ChatMessage;
use mymind_types::error::RepositoryError;
use mymind_types::order::OrderId;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

#[derive(Clone)]
pub struct SqliteMessageStore {
    pool: DatabasePool,
}

impl SqliteMessageStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct MessageRow {
    id: String,
    order_id: String,
    sender_id: String,
    body: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            sender_id: row.try_get("sender_id")?,
            body: row.try_get("body")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let sender_id = self
            .sender_id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid sender_id: {e}")))?;

        Ok(ChatMessage {
            id,
            order_id: OrderId(self.order_id),
            sender_id,
            body: self.body,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl MessageStore for SqliteMessageStore {
    async fn append(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO chat_messages (id, order_id, sender_id, body, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(message.id.to_string())
            .bind(message.order_id.as_str())
            .bind(message.sender_id.to_string())
            .bind(&message.body)
            .bind(format_datetime(&message.created_at))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    async fn list_by_order(&self, order_id: &OrderId) -> Result<Vec<ChatMessage>, RepositoryError> {
        // `id` is a v7 UUID, so it breaks timestamp ties in insertion order.
        let rows = sqlx::query("SELECT * FROM chat_messages WHERE order_id = ? ORDER BY created_at ASC, id ASC")
            .bind(order_id.as_str())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(message_row.into_message()?);
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::order::SqliteOrderRepository;
    use crate::sqlite::test_support::{now, seed_user, test_pool};
    use chrono::Duration;
    use mymind_core::repository::order::OrderRepository;
    use mymind_types::order::{Order, OrderStatus};
    use mymind_types::participant::{ParticipantId, Role};

    async fn seeded_order(pool: &DatabasePool) -> Order {
        let patient = seed_user(pool, Role::Patient, "Pat").await;
        let therapist = seed_user(pool, Role::Therapist, "Tess").await;
        let t0 = now();
        let order = Order {
            order_id: OrderId::generate(),
            patient_id: patient.id,
            therapist_id: therapist.id,
            status: OrderStatus::Active,
            plan: None,
            cost_cents: None,
            created_at: t0,
            purchased_at: None,
            expires_at: None,
        };
        SqliteOrderRepository::new(pool.clone())
            .insert_cart(&order, t0)
            .await
            .unwrap();
        order
    }

    #[tokio::test]
    async fn test_append_and_list_in_order() {
        let pool = test_pool().await;
        let order = seeded_order(&pool).await;
        let store = SqliteMessageStore::new(pool);
        let t0 = now();

        // Appended out of order on purpose.
        let late = ChatMessage::new(order.order_id.clone(), order.therapist_id, "second".into(), t0 + Duration::seconds(2));
        let early = ChatMessage::new(order.order_id.clone(), order.patient_id, "first".into(), t0);
        store.append(&late).await.unwrap();
        store.append(&early).await.unwrap();

        let listed = store.list_by_order(&order.order_id).await.unwrap();
        assert_eq!(listed, vec![early, late]);
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_order() {
        let pool = test_pool().await;
        let order = seeded_order(&pool).await;
        let store = SqliteMessageStore::new(pool);

        store
            .append(&ChatMessage::new(order.order_id.clone(), order.patient_id, "hello".into(), now()))
            .await
            .unwrap();

        assert!(store.list_by_order(&OrderId::from("MM0")).await.unwrap().is_empty());
        assert_eq!(store.list_by_order(&order.order_id).await.unwrap().len(), 1);
        // Restartable: a second read sees the same state.
        assert_eq!(store.list_by_order(&order.order_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_unknown_order_fails() {
        let store = SqliteMessageStore::new(test_pool().await);
        let message = ChatMessage::new(OrderId::from("MM404"), ParticipantId::new(), "hi".into(), now());
        assert!(store.append(&message).await.is_err());
    }
}
