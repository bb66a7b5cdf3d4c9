//! In-memory `EventStore` and `CheckpointRepository` implementations, plus
//! always-failing variants for error-path tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chronicle_core::context::Clock;
use chronicle_core::error::DomainError;
use chronicle_core::event::{ChangeEvent, stream_name};
use chronicle_core::repository::{CheckpointRepository, EventStore, STARTING_CHECKPOINT};
use uuid::Uuid;

use crate::clock::FixedClock;

/// An event store that keeps streams in memory and records every append.
///
/// Appends enforce optimistic concurrency the same way the PostgreSQL
/// store does, and stamp `last_persisted_at` from the configured clock.
pub struct InMemoryEventStore {
    clock: Arc<dyn Clock>,
    streams: Mutex<HashMap<String, Vec<ChangeEvent>>>,
    appended: Mutex<Vec<(String, i64, Vec<ChangeEvent>)>>,
    load_calls: Mutex<usize>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new(Arc::new(FixedClock::reference()))
    }
}

impl InMemoryEventStore {
    /// Creates an empty store stamping events with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            streams: Mutex::new(HashMap::new()),
            appended: Mutex::new(Vec::new()),
            load_calls: Mutex::new(0),
        }
    }

    /// Writes records into a stream as-is, bypassing every check. Used to
    /// simulate legacy or corrupted storage.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert_raw(&self, stream: &str, records: Vec<ChangeEvent>) {
        self.streams
            .lock()
            .unwrap()
            .entry(stream.to_owned())
            .or_default()
            .extend(records);
    }

    /// Returns a snapshot of a stream's records.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn stream(&self, stream: &str) -> Vec<ChangeEvent> {
        self.streams
            .lock()
            .unwrap()
            .get(stream)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns every successful append as `(stream, expected_version, events)`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<(String, i64, Vec<ChangeEvent>)> {
        self.appended.lock().unwrap().clone()
    }

    /// Number of `load_stream` calls served.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn load_calls(&self) -> usize {
        *self.load_calls.lock().unwrap()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn load_stream(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Vec<ChangeEvent>, DomainError> {
        *self.load_calls.lock().unwrap() += 1;
        let mut events = self.stream(&stream_name(aggregate_type, aggregate_id));
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn append_events(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[ChangeEvent],
    ) -> Result<Vec<ChangeEvent>, DomainError> {
        let stream = stream_name(aggregate_type, aggregate_id);
        let mut streams = self.streams.lock().unwrap();
        let existing = streams.entry(stream.clone()).or_default();

        let actual = existing.iter().map(|e| e.version).max().unwrap_or(0);
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let persisted_at = self.clock.now();
        let persisted: Vec<ChangeEvent> = events
            .iter()
            .cloned()
            .map(|mut e| {
                e.last_persisted_at = Some(persisted_at);
                e
            })
            .collect();
        existing.extend(persisted.iter().cloned());

        self.appended
            .lock()
            .unwrap()
            .push((stream, expected_version, persisted.clone()));
        Ok(persisted)
    }

    async fn destroy_all(&self) -> Result<(), DomainError> {
        self.streams.lock().unwrap().clear();
        Ok(())
    }
}

/// A checkpoint repository backed by a map, counting every call.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointRepository {
    checkpoints: Mutex<HashMap<String, i64>>,
    loads: Mutex<usize>,
    saves: Mutex<Vec<(String, i64)>>,
}

impl InMemoryCheckpointRepository {
    /// Creates a repository with one stream already checkpointed.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_checkpoint(stream: &str, checkpoint: i64) -> Self {
        let repo = Self::default();
        repo.checkpoints
            .lock()
            .unwrap()
            .insert(stream.to_owned(), checkpoint);
        repo
    }

    /// Current checkpoint of a stream without counting a load.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn current(&self, stream: &str) -> i64 {
        self.checkpoints
            .lock()
            .unwrap()
            .get(stream)
            .copied()
            .unwrap_or(STARTING_CHECKPOINT)
    }

    /// Number of `load_checkpoint` calls served.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn load_calls(&self) -> usize {
        *self.loads.lock().unwrap()
    }

    /// Every `save_checkpoint` call, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saves(&self) -> Vec<(String, i64)> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckpointRepository for InMemoryCheckpointRepository {
    async fn load_checkpoint(&self, stream_name: &str) -> Result<i64, DomainError> {
        *self.loads.lock().unwrap() += 1;
        Ok(self.current(stream_name))
    }

    async fn save_checkpoint(
        &self,
        stream_name: &str,
        checkpoint: i64,
    ) -> Result<(), DomainError> {
        self.saves
            .lock()
            .unwrap()
            .push((stream_name.to_owned(), checkpoint));
        self.checkpoints
            .lock()
            .unwrap()
            .insert(stream_name.to_owned(), checkpoint);
        Ok(())
    }
}

/// An event store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn load_stream(
        &self,
        _aggregate_type: &str,
        _aggregate_id: Uuid,
    ) -> Result<Vec<ChangeEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append_events(
        &self,
        _aggregate_type: &str,
        _aggregate_id: Uuid,
        _expected_version: i64,
        _events: &[ChangeEvent],
    ) -> Result<Vec<ChangeEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn destroy_all(&self) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// A checkpoint repository whose writes always fail.
#[derive(Debug)]
pub struct FailingCheckpointRepository;

#[async_trait]
impl CheckpointRepository for FailingCheckpointRepository {
    async fn load_checkpoint(&self, _stream_name: &str) -> Result<i64, DomainError> {
        Ok(STARTING_CHECKPOINT)
    }

    async fn save_checkpoint(
        &self,
        _stream_name: &str,
        _checkpoint: i64,
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("checkpoint table locked".into()))
    }
}
