//! SQLite order ledger.
//!
//! Implements `OrderRepository` from `mymind-core`. Every state transition
//! runs as check-then-write inside a transaction on the single-connection
//! writer pool, so concurrent requests observe each other's writes. The
//! partial unique index `idx_orders_one_cart` backs up the one-cart rule.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use mymind_core::repository::order::{Confirmation, OrderRepository};
use mymind_types::error::{ConflictKind, LedgerError, RepositoryError};
use mymind_types::order::{Order, OrderId, OrderStatus, Plan};
use mymind_types::participant::ParticipantId;
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use tracing::warn;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `OrderRepository`.
#[derive(Clone)]
pub struct SqliteOrderRepository {
    pool: DatabasePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct OrderRow {
    order_id: String,
    patient_id: String,
    therapist_id: String,
    status: String,
    plan: Option<String>,
    cost_cents: Option<i64>,
    created_at: String,
    purchased_at: Option<String>,
    expires_at: Option<String>,
}

impl OrderRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            order_id: row.try_get("order_id")?,
            patient_id: row.try_get("patient_id")?,
            therapist_id: row.try_get("therapist_id")?,
            status: row.try_get("status")?,
            plan: row.try_get("plan")?,
            cost_cents: row.try_get("cost_cents")?,
            created_at: row.try_get("created_at")?,
            purchased_at: row.try_get("purchased_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }

    fn into_order(self) -> Result<Order, RepositoryError> {
        let patient_id: ParticipantId = self
            .patient_id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid patient_id: {e}")))?;
        let therapist_id: ParticipantId = self
            .therapist_id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid therapist_id: {e}")))?;
        let status: OrderStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let plan = self
            .plan
            .as_deref()
            .map(str::parse::<Plan>)
            .transpose()
            .map_err(RepositoryError::Query)?;

        Ok(Order {
            order_id: OrderId(self.order_id),
            patient_id,
            therapist_id,
            status,
            plan,
            cost_cents: self.cost_cents.map(|v| v as u32),
            created_at: parse_datetime(&self.created_at)?,
            purchased_at: self.purchased_at.as_deref().map(parse_datetime).transpose()?,
            expires_at: self.expires_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn query_err(e: sqlx::Error) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

fn map_order(row: &sqlx::sqlite::SqliteRow) -> Result<Order, LedgerError> {
    let order = OrderRow::from_row(row)
        .map_err(query_err)?
        .into_order()?;
    Ok(order)
}

async fn fetch_order(conn: &mut SqliteConnection, order_id: &OrderId) -> Result<Option<Order>, LedgerError> {
    let row = sqlx::query("SELECT * FROM orders WHERE order_id = ?")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await
        .map_err(query_err)?;
    row.as_ref().map(map_order).transpose()
}

async fn exists(conn: &mut SqliteConnection, sql: &str, id: &ParticipantId, now: Option<&str>) -> Result<bool, LedgerError> {
    let mut query = sqlx::query(sql).bind(id.to_string());
    if let Some(now) = now {
        query = query.bind(now.to_string());
    }
    let row = query.fetch_optional(conn).await.map_err(query_err)?;
    Ok(row.is_some())
}

const ACTIVE_CART_SQL: &str = "SELECT 1 FROM orders WHERE patient_id = ? AND status = 'active' LIMIT 1";
const PATIENT_LIVE_SQL: &str =
    "SELECT 1 FROM orders WHERE patient_id = ? AND status = 'completed' AND expires_at > ? LIMIT 1";
const THERAPIST_LIVE_SQL: &str =
    "SELECT 1 FROM orders WHERE therapist_id = ? AND status = 'completed' AND expires_at > ? LIMIT 1";

// ---------------------------------------------------------------------------
// OrderRepository implementation
// ---------------------------------------------------------------------------

impl OrderRepository for SqliteOrderRepository {
    async fn insert_cart(&self, order: &Order, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let now = format_datetime(&now);
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        if exists(&mut tx, ACTIVE_CART_SQL, &order.patient_id, None).await? {
            return Err(LedgerError::Conflict(ConflictKind::CartExists));
        }
        if exists(&mut tx, PATIENT_LIVE_SQL, &order.patient_id, Some(&now)).await? {
            return Err(LedgerError::Conflict(ConflictKind::OrderExists));
        }
        if exists(&mut tx, THERAPIST_LIVE_SQL, &order.therapist_id, Some(&now)).await? {
            return Err(LedgerError::Conflict(ConflictKind::TherapistBusy));
        }

        sqlx::query(
            r#"INSERT INTO orders (order_id, patient_id, therapist_id, status, plan, cost_cents, created_at, purchased_at, expires_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(order.order_id.as_str())
        .bind(order.patient_id.to_string())
        .bind(order.therapist_id.to_string())
        .bind(order.status.to_string())
        .bind(order.plan.map(|p| p.to_string()))
        .bind(order.cost_cents.map(|v| v as i64))
        .bind(format_datetime(&order.created_at))
        .bind(order.purchased_at.as_ref().map(format_datetime))
        .bind(order.expires_at.as_ref().map(format_datetime))
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() && db.message().contains("patient_id") => {
                LedgerError::Conflict(ConflictKind::CartExists)
            }
            _ => query_err(e),
        })?;

        tx.commit().await.map_err(query_err)?;
        Ok(())
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.reader.acquire().await.map_err(query_err)?;
        fetch_order(&mut conn, order_id).await
    }

    async fn active_cart(&self, patient_id: &ParticipantId) -> Result<Option<Order>, LedgerError> {
        let row = sqlx::query("SELECT * FROM orders WHERE patient_id = ? AND status = 'active'")
            .bind(patient_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_order).transpose()
    }

    async fn set_cart_plan(&self, patient_id: &ParticipantId, plan: Plan) -> Result<Order, LedgerError> {
        let row = sqlx::query("UPDATE orders SET plan = ? WHERE patient_id = ? AND status = 'active' RETURNING *")
            .bind(plan.to_string())
            .bind(patient_id.to_string())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(query_err)?;
        match row {
            Some(row) => map_order(&row),
            None => Err(LedgerError::NotFound),
        }
    }

    async fn delete_cart(&self, patient_id: &ParticipantId) -> Result<bool, LedgerError> {
        let result = sqlx::query("UPDATE orders SET status = 'deleted' WHERE patient_id = ? AND status = 'active'")
            .bind(patient_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn confirm(&self, order_id: &OrderId, confirmation: &Confirmation) -> Result<Order, LedgerError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let mut order = fetch_order(&mut tx, order_id)
            .await?
            .ok_or(LedgerError::NotFound)?;
        if order.status != OrderStatus::Active {
            return Err(LedgerError::InvalidState(format!("order is {}", order.status)));
        }

        let purchased_at = format_datetime(&confirmation.purchased_at);
        if exists(&mut tx, THERAPIST_LIVE_SQL, &order.therapist_id, Some(&purchased_at)).await? {
            return Err(LedgerError::Conflict(ConflictKind::TherapistBusy));
        }

        if confirmation.plan.is_trial() {
            let claimed = sqlx::query("UPDATE users SET used_trial = 1 WHERE id = ? AND used_trial = 0")
                .bind(order.patient_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
            if claimed.rows_affected() == 0 {
                return Err(LedgerError::Conflict(ConflictKind::TrialUsed));
            }
        }

        sqlx::query(
            r#"UPDATE orders
               SET status = 'completed', plan = ?, cost_cents = ?, purchased_at = ?, expires_at = ?
               WHERE order_id = ?"#,
        )
        .bind(confirmation.plan.to_string())
        .bind(confirmation.cost_cents as i64)
        .bind(&purchased_at)
        .bind(format_datetime(&confirmation.expires_at))
        .bind(order_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;

        order.status = OrderStatus::Completed;
        order.plan = Some(confirmation.plan);
        order.cost_cents = Some(confirmation.cost_cents);
        order.purchased_at = Some(confirmation.purchased_at);
        order.expires_at = Some(confirmation.expires_at);
        Ok(order)
    }

    async fn refund(&self, order_id: &OrderId, now: DateTime<Utc>) -> Result<Order, LedgerError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let mut order = fetch_order(&mut tx, order_id)
            .await?
            .ok_or(LedgerError::NotFound)?;
        if !order.is_live(now) {
            warn!(%order_id, status = %order.status, "refund refused for order that is not live");
            return Err(LedgerError::InvalidState("order is not live".to_string()));
        }

        sqlx::query("UPDATE orders SET status = 'refunded', expires_at = ? WHERE order_id = ?")
            .bind(format_datetime(&now))
            .bind(order_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;

        order.status = OrderStatus::Refunded;
        order.expires_at = Some(now);
        Ok(order)
    }

    async fn find_live_order(
        &self,
        participant_id: &ParticipantId,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, LedgerError> {
        let id = participant_id.to_string();
        let row = sqlx::query(
            r#"SELECT * FROM orders
               WHERE (patient_id = ? OR therapist_id = ?) AND status = 'completed' AND expires_at > ?
               ORDER BY purchased_at DESC
               LIMIT 1"#,
        )
        .bind(&id)
        .bind(&id)
        .bind(format_datetime(&now))
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;
        row.as_ref().map(map_order).transpose()
    }

    async fn busy_therapists(&self, now: DateTime<Utc>) -> Result<HashSet<ParticipantId>, LedgerError> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT therapist_id FROM orders WHERE status = 'completed' AND expires_at > ?",
        )
        .bind(format_datetime(&now))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        ids.iter()
            .map(|id| {
                id.parse::<ParticipantId>()
                    .map_err(|e| LedgerError::Storage(format!("invalid therapist_id: {e}")))
            })
            .collect()
    }

    async fn patient_history(&self, patient_id: &ParticipantId) -> Result<Vec<Order>, LedgerError> {
        let rows = sqlx::query(
            r#"SELECT * FROM orders
               WHERE patient_id = ? AND status IN ('completed', 'refunded')
               ORDER BY purchased_at DESC"#,
        )
        .bind(patient_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        rows.iter().map(map_order).collect()
    }

    async fn therapist_history(&self, therapist_id: &ParticipantId) -> Result<Vec<Order>, LedgerError> {
        let rows = sqlx::query(
            r#"SELECT * FROM orders
               WHERE therapist_id = ? AND status IN ('completed', 'refunded')
               ORDER BY purchased_at DESC"#,
        )
        .bind(therapist_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        rows.iter().map(map_order).collect()
    }
}
