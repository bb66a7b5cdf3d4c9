//! Aggregate root abstraction.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for aggregate roots that reconstitute from event history.
///
/// An aggregate owns an append-only list of events raised since its last
/// save. The command store reads that list on save and clears it once the
/// events are persisted.
pub trait AggregateRoot: Send + Sync + Sized {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Logical aggregate type name, also the projection registry key.
    const AGGREGATE_TYPE: &'static str;

    /// Creates an empty instance ready to load its history.
    fn rehydrate(id: Uuid, last_persisted_at: Option<DateTime<Utc>>) -> Self;

    /// Returns the aggregate identifier, `None` until one is assigned.
    fn aggregate_id(&self) -> Option<Uuid>;

    /// Returns the committed version (number of persisted events applied).
    fn version(&self) -> i64;

    /// Apply a persisted event to mutate internal state.
    fn apply(&mut self, event: &Self::Event);

    /// Applies an ordered history of persisted events.
    fn load_changes(&mut self, events: &[Self::Event]) {
        for event in events {
            self.apply(event);
        }
    }

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Clears uncommitted events after persistence. The committed version
    /// advances by the number of events cleared.
    fn clear_uncommitted_events(&mut self);
}
