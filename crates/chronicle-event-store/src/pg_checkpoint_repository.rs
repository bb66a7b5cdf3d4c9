//! `PostgreSQL` implementation of the `CheckpointRepository` trait.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};

use chronicle_core::error::DomainError;
use chronicle_core::repository::{CheckpointRepository, STARTING_CHECKPOINT};

use crate::infrastructure;

/// PostgreSQL-backed checkpoints, one row per stream.
#[derive(Debug, Clone)]
pub struct PgCheckpointRepository {
    pool: PgPool,
}

impl PgCheckpointRepository {
    /// Creates a new `PgCheckpointRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Removes every checkpoint, so projections replay from the start.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    pub async fn destroy_all(&self) -> Result<(), DomainError> {
        sqlx::query("TRUNCATE projection_checkpoints")
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        warn!("all projection checkpoints destroyed");
        Ok(())
    }
}

#[async_trait]
impl CheckpointRepository for PgCheckpointRepository {
    async fn load_checkpoint(&self, stream_name: &str) -> Result<i64, DomainError> {
        let checkpoint: Option<i64> = sqlx::query_scalar(
            "SELECT checkpoint FROM projection_checkpoints WHERE stream_name = $1",
        )
        .bind(stream_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(checkpoint.unwrap_or(STARTING_CHECKPOINT))
    }

    async fn save_checkpoint(
        &self,
        stream_name: &str,
        checkpoint: i64,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO projection_checkpoints (stream_name, checkpoint)
            VALUES ($1, $2)
            ON CONFLICT (stream_name)
            DO UPDATE SET checkpoint = EXCLUDED.checkpoint, updated_at = NOW()
            ",
        )
        .bind(stream_name)
        .bind(checkpoint)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        debug!(stream_name, checkpoint, "checkpoint saved");
        Ok(())
    }
}
