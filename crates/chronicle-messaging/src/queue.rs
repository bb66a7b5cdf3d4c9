//! Point-to-point FIFO queue with explicit acknowledgement.

use std::fmt::Display;
use std::sync::Arc;

use chronicle_core::context::{CallContext, Clock};
use chronicle_core::error::DomainError;
use chronicle_core::queue::QueueStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::envelope::{OutgoingMessage, QueuedMessage};

/// Result of one receive attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The queue had no deliverable message.
    Empty,
    /// The handler succeeded and the message was removed.
    Acknowledged(Uuid),
    /// The handler failed; the message stays queued.
    Redelivery { message_id: Uuid, reason: String },
}

/// Sends and receives typed messages over a [`QueueStore`].
#[derive(Clone)]
pub struct MessageQueue {
    store: Arc<dyn QueueStore>,
    context: Arc<dyn CallContext>,
    clock: Arc<dyn Clock>,
}

impl MessageQueue {
    #[must_use]
    pub fn new(
        store: Arc<dyn QueueStore>,
        context: Arc<dyn CallContext>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            context,
            clock,
        }
    }

    /// Fills identity defaults, stamps `sent_at`, and appends the message
    /// to `queue`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Unexpected` if the body cannot be serialized,
    /// or `DomainError::Infrastructure` on storage failure.
    pub async fn send<T: Serialize>(
        &self,
        queue: &str,
        message: OutgoingMessage<T>,
    ) -> Result<QueuedMessage<T>, DomainError> {
        let queued = self.stamp(message);
        self.enqueue(queue, &queued).await?;
        info!(
            queue,
            message_id = %queued.message_id,
            tenant_id = %queued.tenant_id,
            "message sent"
        );
        Ok(queued)
    }

    /// Leases the head of `queue` and hands it to `handler`.
    ///
    /// The message is acknowledged only when the handler returns `Ok`. A
    /// handler error releases it for redelivery; so does dropping the
    /// returned future before the handler completes.
    ///
    /// # Errors
    ///
    /// - `DomainError::Unexpected` if the stored body does not deserialize
    ///   as `T`. The message is released, not dropped.
    /// - `DomainError::Infrastructure` on storage failure.
    pub async fn receive_single<T, F, Fut, E>(
        &self,
        queue: &str,
        handler: F,
    ) -> Result<Delivery, DomainError>
    where
        T: DeserializeOwned,
        F: FnOnce(QueuedMessage<T>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let Some(lease) = self.store.pop_single(queue).await? else {
            debug!(queue, "queue empty");
            return Ok(Delivery::Empty);
        };
        let message_id = lease.message_id();

        let message: QueuedMessage<T> = match serde_json::from_str(lease.body()) {
            Ok(message) => message,
            Err(e) => {
                lease.release().await?;
                error!(queue, %message_id, error = %e, "poison message released");
                return Err(DomainError::Unexpected(format!(
                    "message {message_id} on queue {queue} cannot be deserialized: {e}"
                )));
            }
        };

        match handler(message).await {
            Ok(()) => {
                lease.acknowledge().await?;
                debug!(queue, %message_id, "message acknowledged");
                Ok(Delivery::Acknowledged(message_id))
            }
            Err(e) => {
                lease.release().await?;
                warn!(queue, %message_id, error = %e, "handler failed, message released");
                Ok(Delivery::Redelivery {
                    message_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Number of messages in `queue`, leased or not.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    pub async fn depth(&self, queue: &str) -> Result<u64, DomainError> {
        self.store.depth(queue).await
    }

    pub(crate) fn stamp<T>(&self, message: OutgoingMessage<T>) -> QueuedMessage<T> {
        QueuedMessage {
            message_id: message.message_id.unwrap_or_else(Uuid::now_v7),
            tenant_id: message
                .tenant_id
                .unwrap_or_else(|| self.context.tenant_id()),
            call_id: message.call_id.unwrap_or_else(|| self.context.call_id()),
            caller_id: message
                .caller_id
                .unwrap_or_else(|| self.context.caller_id()),
            origin_host_region: message
                .origin_host_region
                .unwrap_or_else(|| self.context.origin_host_region()),
            sent_at: self.clock.now(),
            body: message.body,
        }
    }

    pub(crate) async fn enqueue<T: Serialize>(
        &self,
        queue: &str,
        message: &QueuedMessage<T>,
    ) -> Result<(), DomainError> {
        let body = serde_json::to_string(message)?;
        self.store.push(queue, message.message_id, &body).await
    }
}
