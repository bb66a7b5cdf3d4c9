//! Message queues and topics for inter-process command and event delivery.
//!
//! Messages are removed only after the consumer's handler succeeds; a
//! failed or interrupted handler leaves the message queued for redelivery.

pub mod envelope;
pub mod queue;
pub mod topic;

pub use envelope::{OutgoingMessage, QueuedMessage};
pub use queue::{Delivery, MessageQueue};
pub use topic::{MessageBus, subscription_queue};
