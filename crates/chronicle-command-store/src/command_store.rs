//! Loading and saving event-sourced aggregates.
//!
//! `load` reads a whole stream, verifies it, refuses tombstoned streams, and
//! rehydrates the aggregate through the event type migrator. `save` appends
//! the aggregate's pending events and then notifies every registered
//! [`StreamChangedObserver`] in registration order.

use std::marker::PhantomData;
use std::sync::Arc;

use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::error::DomainError;
use chronicle_core::event::{ChangeEvent, EventMetadata, STARTING_VERSION, stream_name};
use chronicle_core::migrator::EventTypeMigrator;
use chronicle_core::notification::{StreamChanged, StreamChangedObserver};
use chronicle_core::repository::EventStore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Command-side repository for one aggregate type.
pub struct CommandStore<A: AggregateRoot> {
    event_store: Arc<dyn EventStore>,
    migrator: Arc<dyn EventTypeMigrator<A::Event>>,
    observers: Vec<Arc<dyn StreamChangedObserver>>,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A: AggregateRoot> CommandStore<A> {
    /// Creates a command store without observers.
    #[must_use]
    pub fn new(
        event_store: Arc<dyn EventStore>,
        migrator: Arc<dyn EventTypeMigrator<A::Event>>,
    ) -> Self {
        Self {
            event_store,
            migrator,
            observers: Vec::new(),
            _aggregate: PhantomData,
        }
    }

    /// Registers an observer notified after every successful save.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn StreamChangedObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Loads and rehydrates the aggregate with the given id.
    ///
    /// # Errors
    ///
    /// - `DomainError::EntityNotFound` if the stream is empty.
    /// - `DomainError::Unexpected` if a record is corrupt, versions are not
    ///   contiguous, or a record follows a tombstone.
    /// - `DomainError::EntityDeleted` if the stream ends with a tombstone.
    /// - `DomainError::RuleViolation` if any event cannot be migrated.
    /// - Any error from the event store, unchanged.
    pub async fn load(&self, id: Uuid) -> Result<A, DomainError> {
        let stream = stream_name(A::AGGREGATE_TYPE, id);
        let records = self.event_store.load_stream(A::AGGREGATE_TYPE, id).await?;

        let Some(last) = records.last() else {
            debug!(stream_name = %stream, "stream is empty");
            return Err(DomainError::EntityNotFound {
                aggregate_type: A::AGGREGATE_TYPE.to_owned(),
                id,
            });
        };

        verify_integrity(&stream, &records)?;

        if last.is_tombstone {
            debug!(stream_name = %stream, version = last.version, "stream is tombstoned");
            return Err(DomainError::EntityDeleted {
                aggregate_type: A::AGGREGATE_TYPE.to_owned(),
                id,
            });
        }

        let events = records
            .iter()
            .map(|record| {
                self.migrator
                    .migrate(&record.event_type, &record.data)
                    .map_err(|e| {
                        DomainError::RuleViolation(format!(
                            "cannot migrate event {} (version {}, type {}) of stream {stream}: {e}",
                            record.id, record.version, record.event_type
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut aggregate = A::rehydrate(id, last.last_persisted_at);
        aggregate.load_changes(&events);

        debug!(stream_name = %stream, version = aggregate.version(), "aggregate rehydrated");
        Ok(aggregate)
    }

    /// Persists the aggregate's pending events with empty metadata.
    ///
    /// # Errors
    ///
    /// See [`CommandStore::save_with_metadata`].
    pub async fn save(&self, aggregate: &mut A) -> Result<Vec<ChangeEvent>, DomainError> {
        self.save_with_metadata(aggregate, EventMetadata::default())
            .await
    }

    /// Persists the aggregate's pending events, then notifies observers.
    ///
    /// Returns the persisted change-events; empty when nothing was pending.
    /// Pending events are cleared as soon as the append commits, so an
    /// observer failure never causes the same events to be appended twice.
    ///
    /// # Errors
    ///
    /// - `DomainError::EntityExists` if the aggregate has no identifier.
    /// - `DomainError::RuleViolation` if a pending event follows a pending
    ///   tombstone; nothing is appended.
    /// - Any error from the event store, unchanged; pending events are kept.
    /// - The first observer error, after the events were persisted.
    pub async fn save_with_metadata(
        &self,
        aggregate: &mut A,
        metadata: EventMetadata,
    ) -> Result<Vec<ChangeEvent>, DomainError> {
        let Some(id) = aggregate.aggregate_id() else {
            return Err(DomainError::EntityExists(format!(
                "{} has no identifier; assign one before the first save",
                A::AGGREGATE_TYPE
            )));
        };

        let stream = stream_name(A::AGGREGATE_TYPE, id);
        let pending = aggregate.uncommitted_events();
        if pending.is_empty() {
            debug!(stream_name = %stream, "nothing to save");
            return Ok(Vec::new());
        }

        let expected_version = aggregate.version();
        let records = (expected_version + 1..)
            .zip(pending)
            .map(|(version, event)| {
                ChangeEvent::pending(A::AGGREGATE_TYPE, id, version, event, metadata.clone())
            })
            .collect::<Result<Vec<_>, _>>()?;
        ensure_tombstone_is_last(&stream, &records)?;

        let persisted = self
            .event_store
            .append_events(A::AGGREGATE_TYPE, id, expected_version, &records)
            .await?;
        aggregate.clear_uncommitted_events();

        info!(
            stream_name = %stream,
            from_version = expected_version + 1,
            count = persisted.len(),
            "events appended"
        );

        let notification = StreamChanged {
            stream_name: stream,
            events: persisted,
        };
        for observer in &self.observers {
            if let Err(e) = observer.on_stream_changed(&notification).await {
                warn!(
                    stream_name = %notification.stream_name,
                    error = %e,
                    "stream changed observer failed after commit"
                );
                return Err(e);
            }
        }

        Ok(notification.events)
    }
}

/// Checks required fields, version contiguity, and that nothing follows a
/// tombstone in a loaded stream.
fn verify_integrity(stream: &str, records: &[ChangeEvent]) -> Result<(), DomainError> {
    let mut tombstoned_at = None;
    for (expected, record) in (STARTING_VERSION..).zip(records) {
        if let Some(field) = record.missing_field() {
            error!(
                stream_name = %stream,
                event_id = %record.id,
                version = record.version,
                field,
                "corrupt change-event"
            );
            return Err(DomainError::Unexpected(format!(
                "corrupt change-event in stream {stream}: {field} is empty \
                 (event id {}, version {}, event type '{}', aggregate type '{}')",
                record.id, record.version, record.event_type, record.root_aggregate_type
            )));
        }
        if record.version != expected {
            error!(
                stream_name = %stream,
                event_id = %record.id,
                expected,
                found = record.version,
                "non-contiguous stream"
            );
            return Err(DomainError::Unexpected(format!(
                "stream {stream} is not contiguous: expected version {expected}, \
                 found {} (event id {})",
                record.version, record.id
            )));
        }
        if let Some(tombstone_version) = tombstoned_at {
            error!(
                stream_name = %stream,
                event_id = %record.id,
                version = record.version,
                tombstone_version,
                "change-event after tombstone"
            );
            return Err(DomainError::Unexpected(format!(
                "stream {stream} continues after its tombstone at version {tombstone_version}: \
                 event id {}, version {}",
                record.id, record.version
            )));
        }
        if record.is_tombstone {
            tombstoned_at = Some(record.version);
        }
    }
    Ok(())
}

/// Rejects a batch in which anything follows a tombstone.
fn ensure_tombstone_is_last(stream: &str, records: &[ChangeEvent]) -> Result<(), DomainError> {
    let Some(position) = records.iter().position(|record| record.is_tombstone) else {
        return Ok(());
    };
    match records.get(position + 1) {
        None => Ok(()),
        Some(next) => Err(DomainError::RuleViolation(format!(
            "cannot save {} after the tombstone at version {} of stream {stream}",
            next.event_type, records[position].version
        ))),
    }
}
