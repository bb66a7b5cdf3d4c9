//! The "stream changed" notification raised after a successful save.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::event::ChangeEvent;

/// Events appended to one stream by a single save.
#[derive(Debug, Clone)]
pub struct StreamChanged {
    /// The stream that was appended to.
    pub stream_name: String,
    /// The appended events, in version order, with persistence timestamps.
    pub events: Vec<ChangeEvent>,
}

/// In-process subscriber to [`StreamChanged`] notifications.
#[async_trait]
pub trait StreamChangedObserver: Send + Sync {
    /// Handles one notification. Runs synchronously within the save call.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the observer could not process the events;
    /// the events stay persisted regardless.
    async fn on_stream_changed(&self, notification: &StreamChanged) -> Result<(), DomainError>;
}
