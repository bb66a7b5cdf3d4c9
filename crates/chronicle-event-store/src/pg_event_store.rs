//! `PostgreSQL` implementation of the `EventStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use chronicle_core::error::DomainError;
use chronicle_core::event::{ChangeEvent, EventMetadata, STARTING_VERSION, stream_name};
use chronicle_core::repository::EventStore;

use crate::infrastructure;

/// PostgreSQL-backed event store over the `change_events` table.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn change_event_from_row(row: &PgRow) -> Result<ChangeEvent, DomainError> {
    let metadata: Json<EventMetadata> = row.try_get("metadata").map_err(infrastructure)?;
    let persisted_at: DateTime<Utc> = row.try_get("persisted_at").map_err(infrastructure)?;
    Ok(ChangeEvent {
        id: row.try_get("id").map_err(infrastructure)?,
        stream_name: row.try_get("stream_name").map_err(infrastructure)?,
        root_aggregate_type: row.try_get("root_aggregate_type").map_err(infrastructure)?,
        event_type: row.try_get("event_type").map_err(infrastructure)?,
        metadata: metadata.0,
        data: row.try_get("data").map_err(infrastructure)?,
        version: row.try_get("version").map_err(infrastructure)?,
        last_persisted_at: Some(persisted_at),
        is_tombstone: row.try_get("is_tombstone").map_err(infrastructure)?,
    })
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn load_stream(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Vec<ChangeEvent>, DomainError> {
        let stream = stream_name(aggregate_type, aggregate_id);
        let rows = sqlx::query(
            r"
            SELECT id, stream_name, root_aggregate_type, event_type, metadata, data,
                   version, is_tombstone, persisted_at
            FROM change_events
            WHERE stream_name = $1
            ORDER BY version
            ",
        )
        .bind(&stream)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        debug!(stream_name = %stream, count = rows.len(), "stream loaded");
        rows.iter().map(change_event_from_row).collect()
    }

    async fn append_events(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[ChangeEvent],
    ) -> Result<Vec<ChangeEvent>, DomainError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        let stream = stream_name(aggregate_type, aggregate_id);

        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM change_events WHERE stream_name = $1")
                .bind(&stream)
                .fetch_one(&mut *tx)
                .await
                .map_err(infrastructure)?;
        let actual = current.unwrap_or(STARTING_VERSION - 1);
        if actual != expected_version {
            warn!(stream_name = %stream, expected_version, actual, "stale expected version");
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let mut persisted = Vec::with_capacity(events.len());
        for event in events {
            let persisted_at: DateTime<Utc> = sqlx::query_scalar(
                r"
                INSERT INTO change_events
                    (id, stream_name, root_aggregate_type, event_type, metadata, data,
                     version, is_tombstone)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING persisted_at
                ",
            )
            .bind(event.id)
            .bind(&stream)
            .bind(aggregate_type)
            .bind(&event.event_type)
            .bind(Json(&event.metadata))
            .bind(&event.data)
            .bind(event.version)
            .bind(event.is_tombstone)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match e {
                // A concurrent writer committed the same version first.
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    DomainError::ConcurrencyConflict {
                        aggregate_id,
                        expected: expected_version,
                        actual: event.version,
                    }
                }
                other => infrastructure(other),
            })?;

            persisted.push(ChangeEvent {
                last_persisted_at: Some(persisted_at),
                ..event.clone()
            });
        }

        tx.commit().await.map_err(infrastructure)?;
        info!(
            stream_name = %stream,
            from_version = expected_version + 1,
            count = persisted.len(),
            "events appended"
        );
        Ok(persisted)
    }

    async fn destroy_all(&self) -> Result<(), DomainError> {
        sqlx::query("TRUNCATE change_events")
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        warn!("all change events destroyed");
        Ok(())
    }
}
