//! Storage abstractions: the event store and the checkpoint repository.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::ChangeEvent;

/// Checkpoint value of a stream that has never been projected.
///
/// A checkpoint is the last applied version, not the next one to apply.
pub const STARTING_CHECKPOINT: i64 = 0;

/// Durable, ordered, per-stream event storage.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Load all events of an aggregate stream, ordered by version.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the storage cannot be read.
    async fn load_stream(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Vec<ChangeEvent>, DomainError>;

    /// Append events atomically to an aggregate stream.
    ///
    /// `expected_version` is the last version the writer observed. Returns
    /// the appended events with their persistence timestamps assigned.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` if the stream moved past
    /// `expected_version`, or `DomainError::Infrastructure` on storage failure.
    async fn append_events(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[ChangeEvent],
    ) -> Result<Vec<ChangeEvent>, DomainError>;

    /// Remove every stream. Test and operations teardown only.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn destroy_all(&self) -> Result<(), DomainError>;
}

/// Durable "last projected version" per stream name.
#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    /// Returns the stream's checkpoint, or [`STARTING_CHECKPOINT`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn load_checkpoint(&self, stream_name: &str) -> Result<i64, DomainError>;

    /// Stores the stream's checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn save_checkpoint(&self, stream_name: &str, checkpoint: i64)
    -> Result<(), DomainError>;
}
