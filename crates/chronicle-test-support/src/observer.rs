//! Test `StreamChangedObserver` implementations.

use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::error::DomainError;
use chronicle_core::notification::{StreamChanged, StreamChangedObserver};

/// Records every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    received: Mutex<Vec<StreamChanged>>,
}

impl RecordingObserver {
    /// Returns a snapshot of all received notifications.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn received(&self) -> Vec<StreamChanged> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamChangedObserver for RecordingObserver {
    async fn on_stream_changed(&self, notification: &StreamChanged) -> Result<(), DomainError> {
        self.received.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Rejects every notification with an infrastructure error.
#[derive(Debug)]
pub struct FailingObserver;

#[async_trait]
impl StreamChangedObserver for FailingObserver {
    async fn on_stream_changed(&self, _notification: &StreamChanged) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("read model unavailable".into()))
    }
}
