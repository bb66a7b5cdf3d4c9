//! Publish/subscribe over queues: each subscription of a topic is its own
//! FIFO queue named `{topic}/{subscription}`.

use std::collections::BTreeMap;
use std::fmt::Display;

use chronicle_core::error::DomainError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::envelope::{OutgoingMessage, QueuedMessage};
use crate::queue::{Delivery, MessageQueue};

/// Queue name backing one subscription of a topic.
#[must_use]
pub fn subscription_queue(topic: &str, subscription: &str) -> String {
    format!("{topic}/{subscription}")
}

/// Topics with subscriptions fixed at startup.
#[derive(Clone)]
pub struct MessageBus {
    queue: MessageQueue,
    subscriptions: BTreeMap<String, Vec<String>>,
}

impl MessageBus {
    #[must_use]
    pub fn new(queue: MessageQueue) -> Self {
        Self {
            queue,
            subscriptions: BTreeMap::new(),
        }
    }

    /// Subscribes `subscription` to `topic`. Re-adding is a no-op.
    #[must_use]
    pub fn with_subscription(mut self, topic: &str, subscription: &str) -> Self {
        let subs = self.subscriptions.entry(topic.to_owned()).or_default();
        if !subs.iter().any(|s| s == subscription) {
            subs.push(subscription.to_owned());
        }
        self
    }

    /// Subscriptions of `topic`, in registration order.
    #[must_use]
    pub fn subscriptions(&self, topic: &str) -> &[String] {
        self.subscriptions.get(topic).map_or(&[], Vec::as_slice)
    }

    /// Stamps the message once and appends a copy to every subscription
    /// queue of `topic`. All copies share the same message id.
    ///
    /// # Errors
    ///
    /// - `DomainError::RuleViolation` if `topic` has no subscriptions.
    /// - `DomainError::Unexpected` if the body cannot be serialized.
    /// - `DomainError::Infrastructure` on storage failure. Copies already
    ///   appended to earlier subscriptions stay queued.
    pub async fn publish<T: Serialize>(
        &self,
        topic: &str,
        message: OutgoingMessage<T>,
    ) -> Result<QueuedMessage<T>, DomainError> {
        let subscriptions = self.subscriptions(topic);
        if subscriptions.is_empty() {
            return Err(DomainError::RuleViolation(format!(
                "topic {topic} has no subscriptions"
            )));
        }

        let queued = self.queue.stamp(message);
        for subscription in subscriptions {
            self.queue
                .enqueue(&subscription_queue(topic, subscription), &queued)
                .await?;
        }
        info!(
            topic,
            message_id = %queued.message_id,
            fan_out = subscriptions.len(),
            "message published"
        );
        Ok(queued)
    }

    /// Receives the head of one subscription, with the same lease and
    /// acknowledgement semantics as [`MessageQueue::receive_single`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RuleViolation` for an unknown subscription, or
    /// any error of [`MessageQueue::receive_single`].
    pub async fn receive_single<T, F, Fut, E>(
        &self,
        topic: &str,
        subscription: &str,
        handler: F,
    ) -> Result<Delivery, DomainError>
    where
        T: DeserializeOwned,
        F: FnOnce(QueuedMessage<T>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        if !self.subscriptions(topic).iter().any(|s| s == subscription) {
            return Err(DomainError::RuleViolation(format!(
                "subscription {subscription} is not registered on topic {topic}"
            )));
        }
        self.queue
            .receive_single(&subscription_queue(topic, subscription), handler)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chronicle_core::error::DomainError;
    use chronicle_test_support::{FixedCallContext, FixedClock, InMemoryQueueStore};
    use serde::{Deserialize, Serialize};

    use super::{MessageBus, subscription_queue};
    use crate::envelope::{OutgoingMessage, QueuedMessage};
    use crate::queue::{Delivery, MessageQueue};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct LedgerClosed {
        ledger: String,
    }

    fn bus_over(store: &InMemoryQueueStore) -> MessageBus {
        MessageBus::new(MessageQueue::new(
            Arc::new(store.clone()),
            Arc::new(FixedCallContext::default()),
            Arc::new(FixedClock::reference()),
        ))
        .with_subscription("ledgers", "billing")
        .with_subscription("ledgers", "audit")
        .with_subscription("ledgers", "audit")
    }

    fn closed() -> OutgoingMessage<LedgerClosed> {
        OutgoingMessage::new(LedgerClosed {
            ledger: "ledger-1".to_owned(),
        })
    }

    #[tokio::test]
    async fn test_publish_fans_out_to_each_subscription() {
        // Arrange
        let store = InMemoryQueueStore::default();
        let bus = bus_over(&store);

        // Act
        let published = bus.publish("ledgers", closed()).await.unwrap();

        // Assert
        assert_eq!(bus.subscriptions("ledgers"), ["billing", "audit"]);
        assert_eq!(store.bodies(&subscription_queue("ledgers", "billing")).len(), 1);
        assert_eq!(store.bodies(&subscription_queue("ledgers", "audit")).len(), 1);

        let delivery = bus
            .receive_single("ledgers", "audit", |message: QueuedMessage<LedgerClosed>| {
                let same_id = message.message_id == published.message_id;
                async move { if same_id { Ok(()) } else { Err("wrong message") } }
            })
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Acknowledged(published.message_id));
        assert!(store.bodies(&subscription_queue("ledgers", "audit")).is_empty());
        assert_eq!(store.bodies(&subscription_queue("ledgers", "billing")).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_subscriber_does_not_affect_others() {
        let store = InMemoryQueueStore::default();
        let bus = bus_over(&store);
        bus.publish("ledgers", closed()).await.unwrap();

        let billing = bus
            .receive_single("ledgers", "billing", |_: QueuedMessage<LedgerClosed>| async {
                Err("billing down")
            })
            .await
            .unwrap();
        let audit = bus
            .receive_single("ledgers", "audit", |_: QueuedMessage<LedgerClosed>| async {
                Ok::<(), String>(())
            })
            .await
            .unwrap();

        assert!(matches!(billing, Delivery::Redelivery { .. }));
        assert!(matches!(audit, Delivery::Acknowledged(_)));
        assert_eq!(store.bodies(&subscription_queue("ledgers", "billing")).len(), 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscriptions_is_rejected() {
        let store = InMemoryQueueStore::default();
        let bus = bus_over(&store);

        let result = bus.publish("invoices", closed()).await;

        assert!(matches!(result, Err(DomainError::RuleViolation(_))));
    }

    #[tokio::test]
    async fn test_receive_from_unknown_subscription_is_rejected() {
        let store = InMemoryQueueStore::default();
        let bus = bus_over(&store);

        let result = bus
            .receive_single("ledgers", "shipping", |_: QueuedMessage<LedgerClosed>| async {
                Ok::<(), String>(())
            })
            .await;

        assert!(matches!(result, Err(DomainError::RuleViolation(_))));
    }
}
