//! Message envelopes: what a producer hands over, and what is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message about to be sent. Absent identity fields are filled from the
/// calling context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage<T> {
    /// Unique message id; a v7 id is assigned when absent.
    pub message_id: Option<Uuid>,
    /// Tenant the message belongs to.
    pub tenant_id: Option<String>,
    /// Id of the call that produced the message.
    pub call_id: Option<Uuid>,
    /// Identity of the producer.
    pub caller_id: Option<String>,
    /// Region of the host that sent the message.
    pub origin_host_region: Option<String>,
    /// Application payload.
    pub body: T,
}

impl<T> OutgoingMessage<T> {
    /// A message with every identity field left to the sender.
    #[must_use]
    pub fn new(body: T) -> Self {
        Self {
            message_id: None,
            tenant_id: None,
            call_id: None,
            caller_id: None,
            origin_host_region: None,
            body,
        }
    }

    /// Sends under a caller-chosen message id.
    #[must_use]
    pub fn with_message_id(mut self, message_id: Uuid) -> Self {
        self.message_id = Some(message_id);
        self
    }

    /// Overrides the context's tenant.
    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Overrides the context's call id.
    #[must_use]
    pub fn with_call_id(mut self, call_id: Uuid) -> Self {
        self.call_id = Some(call_id);
        self
    }

    /// Overrides the context's caller.
    #[must_use]
    pub fn with_caller_id(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }

    /// Overrides the context's host region.
    #[must_use]
    pub fn with_origin_host_region(mut self, origin_host_region: impl Into<String>) -> Self {
        self.origin_host_region = Some(origin_host_region.into());
        self
    }
}

/// A fully-populated message, as stored and as delivered to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage<T> {
    /// Unique message id; copies fanned out from one publish share it.
    pub message_id: Uuid,
    /// Tenant the message belongs to.
    pub tenant_id: String,
    /// Id of the call that produced the message.
    pub call_id: Uuid,
    /// Identity of the producer.
    pub caller_id: String,
    /// Region of the host that sent the message.
    pub origin_host_region: String,
    /// When the sender stamped the message, from its clock.
    pub sent_at: DateTime<Utc>,
    /// Application payload.
    pub body: T,
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::OutgoingMessage;

    #[test]
    fn test_new_leaves_identity_to_sender() {
        let message = OutgoingMessage::new("payload");

        assert_eq!(message.message_id, None);
        assert_eq!(message.tenant_id, None);
        assert_eq!(message.call_id, None);
        assert_eq!(message.caller_id, None);
        assert_eq!(message.origin_host_region, None);
    }

    #[test]
    fn test_builders_set_every_identity_field() {
        let message_id = Uuid::new_v4();
        let call_id = Uuid::new_v4();

        let message = OutgoingMessage::new("payload")
            .with_message_id(message_id)
            .with_tenant_id("tenant-a")
            .with_call_id(call_id)
            .with_caller_id("importer")
            .with_origin_host_region("eu-west");

        assert_eq!(message.message_id, Some(message_id));
        assert_eq!(message.tenant_id.as_deref(), Some("tenant-a"));
        assert_eq!(message.call_id, Some(call_id));
        assert_eq!(message.caller_id.as_deref(), Some("importer"));
        assert_eq!(message.origin_host_region.as_deref(), Some("eu-west"));
    }
}
