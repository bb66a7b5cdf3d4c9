//! Checkpoint-driven dispatch of change-event batches to projections.
//!
//! Per stream the projector moves through `NotStarted -> CatchingUp ->
//! Applying -> Checkpointed`. A version gap or a projection that does not
//! handle an event leaves the stream blocked: the checkpoint stays where it
//! was, so the next invocation retries the same events.
//!
//! Cancelling a `project` future (dropping it) is safe at any await point.
//! The checkpoint write is the final step of a batch, so a cancelled batch
//! never advances the checkpoint partially.

use std::sync::Arc;

use async_trait::async_trait;
use chronicle_core::error::DomainError;
use chronicle_core::event::{ChangeEvent, stream_name};
use chronicle_core::notification::{StreamChanged, StreamChangedObserver};
use chronicle_core::repository::{CheckpointRepository, EventStore, STARTING_CHECKPOINT};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::registry::ProjectionRegistry;

/// Result of projecting one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionOutcome {
    /// The projected stream.
    pub stream_name: String,
    /// Events dispatched to the projection.
    pub applied: usize,
    /// Events already covered by the checkpoint.
    pub skipped: usize,
    /// Checkpoint after the batch; `None` for an empty batch, which never
    /// consults the checkpoint repository.
    pub checkpoint: Option<i64>,
}

/// Synchronous, in-process read-model projector.
///
/// Callers must not project the same stream concurrently; the checkpoint
/// assumes a single writer per stream.
pub struct Projector {
    registry: ProjectionRegistry,
    checkpoints: Arc<dyn CheckpointRepository>,
}

impl Projector {
    /// Creates a projector over a registry built at startup.
    #[must_use]
    pub fn new(registry: ProjectionRegistry, checkpoints: Arc<dyn CheckpointRepository>) -> Self {
        Self {
            registry,
            checkpoints,
        }
    }

    /// Aggregate types with a registered projection.
    #[must_use]
    pub fn registered_aggregate_types(&self) -> Vec<&str> {
        self.registry.aggregate_types()
    }

    /// Projects one stream's batch, then advances its checkpoint.
    ///
    /// # Errors
    ///
    /// - `DomainError::RuleViolation` if no projection is registered for the
    ///   batch's aggregate type, the batch mixes streams or aggregate types,
    ///   or an event cannot be migrated.
    /// - `DomainError::StreamCorrupted` if an event's version is more than
    ///   one past the checkpoint.
    /// - `DomainError::Unexpected` if the projection does not handle an event.
    /// - Any checkpoint repository or projection error, unchanged.
    ///
    /// On error the checkpoint is unchanged.
    pub async fn project(
        &self,
        stream_name: &str,
        events: &[ChangeEvent],
    ) -> Result<ProjectionOutcome, DomainError> {
        let Some(first) = events.first() else {
            return Ok(ProjectionOutcome {
                stream_name: stream_name.to_owned(),
                applied: 0,
                skipped: 0,
                checkpoint: None,
            });
        };

        let aggregate_type = first.root_aggregate_type.as_str();
        if let Some(stray) = events
            .iter()
            .find(|e| e.root_aggregate_type != aggregate_type || e.stream_name != stream_name)
        {
            return Err(DomainError::RuleViolation(format!(
                "batch for stream {stream_name} ({aggregate_type}) contains event {} \
                 from stream {} ({})",
                stray.id, stray.stream_name, stray.root_aggregate_type
            )));
        }

        let Some(handler) = self.registry.resolve(aggregate_type) else {
            error!(
                stream_name,
                aggregate_type, "projection not configured for aggregate type"
            );
            return Err(DomainError::RuleViolation(format!(
                "projection not configured for aggregate type {aggregate_type}"
            )));
        };

        let mut batch: Vec<&ChangeEvent> = events.iter().collect();
        batch.sort_by_key(|e| e.version);

        let start = self.checkpoints.load_checkpoint(stream_name).await?;
        let mut checkpoint = start;
        let mut applied = 0;
        let mut skipped = 0;

        for record in batch {
            if record.version <= checkpoint {
                debug!(
                    stream_name,
                    version = record.version,
                    checkpoint,
                    "skipping already projected event"
                );
                skipped += 1;
                continue;
            }

            let expected = checkpoint + 1;
            if record.version > expected {
                error!(
                    stream_name,
                    expected,
                    found = record.version,
                    event_id = %record.id,
                    "version gap, stream blocked"
                );
                return Err(DomainError::StreamCorrupted {
                    stream_name: stream_name.to_owned(),
                    expected,
                    found: record.version,
                });
            }

            if !handler.handle(record).await? {
                error!(
                    stream_name,
                    projection = handler.name(),
                    event_id = %record.id,
                    event_type = %record.event_type,
                    "projection has no handler for event"
                );
                return Err(DomainError::Unexpected(format!(
                    "missing handler: projection {} did not handle event {} \
                     of type {} (stream {stream_name}, version {})",
                    handler.name(),
                    record.id,
                    record.event_type,
                    record.version
                )));
            }

            checkpoint = expected;
            applied += 1;
        }

        if applied > 0 {
            self.checkpoints
                .save_checkpoint(stream_name, checkpoint)
                .await?;
            info!(
                stream_name,
                projection = handler.name(),
                from = start,
                to = checkpoint,
                "checkpoint advanced"
            );
        }

        Ok(ProjectionOutcome {
            stream_name: stream_name.to_owned(),
            applied,
            skipped,
            checkpoint: Some(checkpoint),
        })
    }

    /// Reads an aggregate's whole stream and projects whatever the
    /// checkpoint does not cover yet.
    ///
    /// # Errors
    ///
    /// Any event store error, or any error of [`Projector::project`].
    pub async fn catch_up(
        &self,
        event_store: &dyn EventStore,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<ProjectionOutcome, DomainError> {
        let stream = stream_name(aggregate_type, aggregate_id);
        let events = event_store
            .load_stream(aggregate_type, aggregate_id)
            .await?;
        debug!(stream_name = %stream, count = events.len(), "catching up stream");
        self.project(&stream, &events).await
    }

    /// Current checkpoint of a stream.
    ///
    /// # Errors
    ///
    /// Any checkpoint repository error.
    pub async fn checkpoint(&self, stream_name: &str) -> Result<i64, DomainError> {
        self.checkpoints.load_checkpoint(stream_name).await
    }

    /// Administrative rewind of a stream's checkpoint, to `to` or to the
    /// starting value. A later catch-up replays from there.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RuleViolation` for a negative target, or any
    /// checkpoint repository error.
    pub async fn reset_checkpoint(
        &self,
        stream_name: &str,
        to: Option<i64>,
    ) -> Result<(), DomainError> {
        let target = to.unwrap_or(STARTING_CHECKPOINT);
        if target < STARTING_CHECKPOINT {
            return Err(DomainError::RuleViolation(format!(
                "checkpoint for {stream_name} cannot be reset to negative value {target}"
            )));
        }
        self.checkpoints
            .save_checkpoint(stream_name, target)
            .await?;
        info!(stream_name, checkpoint = target, "checkpoint reset");
        Ok(())
    }
}

#[async_trait]
impl StreamChangedObserver for Projector {
    async fn on_stream_changed(&self, notification: &StreamChanged) -> Result<(), DomainError> {
        self.project(&notification.stream_name, &notification.events)
            .await
            .map(|_| ())
    }
}
