//! `PostgreSQL` implementation of the `QueueStore` trait.
//!
//! A lease is an open transaction holding a row lock on the message
//! (`FOR UPDATE SKIP LOCKED`). Acknowledging deletes the row and commits;
//! releasing, or dropping the lease, rolls back and unlocks it.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use chronicle_core::error::DomainError;
use chronicle_core::queue::{MessageLease, QueueStore};

use crate::infrastructure;

/// PostgreSQL-backed FIFO queues over the `message_queue` table.
#[derive(Debug, Clone)]
pub struct PgQueueStore {
    pool: PgPool,
}

impl PgQueueStore {
    /// Creates a new `PgQueueStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Removes every queued message of every queue.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    pub async fn destroy_all(&self) -> Result<(), DomainError> {
        sqlx::query("TRUNCATE message_queue")
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        warn!("all queued messages destroyed");
        Ok(())
    }
}

#[async_trait]
impl QueueStore for PgQueueStore {
    async fn push(&self, queue: &str, message_id: Uuid, body: &str) -> Result<(), DomainError> {
        sqlx::query("INSERT INTO message_queue (queue_name, message_id, body) VALUES ($1, $2, $3)")
            .bind(queue)
            .bind(message_id)
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        debug!(queue, %message_id, "message pushed");
        Ok(())
    }

    async fn pop_single(&self, queue: &str) -> Result<Option<Box<dyn MessageLease>>, DomainError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;
        let row = sqlx::query(
            r"
            SELECT sequence, message_id, body
            FROM message_queue
            WHERE queue_name = $1
            ORDER BY sequence
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            ",
        )
        .bind(queue)
        .fetch_optional(&mut *tx)
        .await
        .map_err(infrastructure)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(infrastructure)?;
            return Ok(None);
        };

        Ok(Some(Box::new(PgMessageLease {
            tx,
            sequence: row.try_get("sequence").map_err(infrastructure)?,
            message_id: row.try_get("message_id").map_err(infrastructure)?,
            body: row.try_get("body").map_err(infrastructure)?,
        })))
    }

    async fn depth(&self, queue: &str) -> Result<u64, DomainError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM message_queue WHERE queue_name = $1")
                .bind(queue)
                .fetch_one(&self.pool)
                .await
                .map_err(infrastructure)?;
        u64::try_from(count).map_err(|e| DomainError::Unexpected(e.to_string()))
    }
}

/// A message row locked by an open transaction.
struct PgMessageLease {
    tx: Transaction<'static, Postgres>,
    sequence: i64,
    message_id: Uuid,
    body: String,
}

#[async_trait]
impl MessageLease for PgMessageLease {
    fn message_id(&self) -> Uuid {
        self.message_id
    }

    fn body(&self) -> &str {
        &self.body
    }

    async fn acknowledge(self: Box<Self>) -> Result<(), DomainError> {
        let mut lease = *self;
        sqlx::query("DELETE FROM message_queue WHERE sequence = $1")
            .bind(lease.sequence)
            .execute(&mut *lease.tx)
            .await
            .map_err(infrastructure)?;
        lease.tx.commit().await.map_err(infrastructure)
    }

    async fn release(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.rollback().await.map_err(infrastructure)
    }
}
