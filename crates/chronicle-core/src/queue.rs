//! FIFO queue storage with leased, explicitly acknowledged delivery.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;

/// A message held by exactly one consumer attempt.
///
/// Dropping a lease without acknowledging it releases the message, which
/// is what happens when a consumer crashes mid-handler.
#[async_trait]
pub trait MessageLease: Send {
    /// Identifier assigned when the message was pushed.
    fn message_id(&self) -> Uuid;

    /// The serialized message.
    fn body(&self) -> &str;

    /// Permanently removes the message.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure; the message
    /// then stays queued.
    async fn acknowledge(self: Box<Self>) -> Result<(), DomainError>;

    /// Returns the message to the queue for redelivery.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn release(self: Box<Self>) -> Result<(), DomainError>;
}

/// Durable FIFO queues addressed by name.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Appends a serialized message to the tail of `queue`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn push(&self, queue: &str, message_id: Uuid, body: &str) -> Result<(), DomainError>;

    /// Leases the head of `queue`, skipping messages leased by others.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn pop_single(&self, queue: &str) -> Result<Option<Box<dyn MessageLease>>, DomainError>;

    /// Number of messages in `queue`, leased or not.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failure.
    async fn depth(&self, queue: &str) -> Result<u64, DomainError>;
}
