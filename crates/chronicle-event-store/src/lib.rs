//! `PostgreSQL` adapters for the Chronicle storage traits.

pub mod pg_checkpoint_repository;
pub mod pg_event_store;
pub mod pg_queue_store;

pub use pg_checkpoint_repository::PgCheckpointRepository;
pub use pg_event_store::PgEventStore;
pub use pg_queue_store::PgQueueStore;

use chronicle_core::error::DomainError;

/// Maps a driver error to the storage-failure category.
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn infrastructure(error: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(error.to_string())
}
