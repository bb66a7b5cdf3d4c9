//! Read-model projection abstraction.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::event::{ChangeEvent, DomainEvent};

/// Applies the events of one aggregate type to a read model.
#[async_trait]
pub trait ReadModelProjection: Send + Sync {
    /// The migrated event type this projection consumes.
    type Event: DomainEvent;

    /// Projection identity, used in diagnostics.
    fn name(&self) -> &'static str;

    /// The aggregate type whose streams this projection handles.
    fn root_aggregate_type(&self) -> &'static str;

    /// Applies one event to the read model.
    ///
    /// Returns `Ok(false)` when the projection does not recognize the event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the read model cannot be updated.
    async fn project_event(
        &self,
        event: &Self::Event,
        record: &ChangeEvent,
    ) -> Result<bool, DomainError>;
}
