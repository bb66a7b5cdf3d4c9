//! In-memory `QueueStore` with lease semantics matching the PostgreSQL store.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chronicle_core::error::DomainError;
use chronicle_core::queue::{MessageLease, QueueStore};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Entry {
    message_id: Uuid,
    body: String,
    leased: bool,
}

type Queues = Arc<Mutex<HashMap<String, VecDeque<Entry>>>>;

/// FIFO queues in memory. A leased message is invisible to other consumers
/// until it is acknowledged, released, or its lease is dropped.
#[derive(Debug, Default, Clone)]
pub struct InMemoryQueueStore {
    queues: Queues,
}

impl InMemoryQueueStore {
    /// Bodies currently in `queue`, head first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn bodies(&self, queue: &str) -> Vec<String> {
        self.queues
            .lock()
            .unwrap()
            .get(queue)
            .map(|entries| entries.iter().map(|e| e.body.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn push(&self, queue: &str, message_id: Uuid, body: &str) -> Result<(), DomainError> {
        self.queues
            .lock()
            .unwrap()
            .entry(queue.to_owned())
            .or_default()
            .push_back(Entry {
                message_id,
                body: body.to_owned(),
                leased: false,
            });
        Ok(())
    }

    async fn pop_single(&self, queue: &str) -> Result<Option<Box<dyn MessageLease>>, DomainError> {
        let mut queues = self.queues.lock().unwrap();
        let Some(entries) = queues.get_mut(queue) else {
            return Ok(None);
        };
        let Some(entry) = entries.iter_mut().find(|e| !e.leased) else {
            return Ok(None);
        };
        entry.leased = true;

        Ok(Some(Box::new(InMemoryLease {
            queues: Arc::clone(&self.queues),
            queue: queue.to_owned(),
            message_id: entry.message_id,
            body: entry.body.clone(),
            settled: false,
        })))
    }

    async fn depth(&self, queue: &str) -> Result<u64, DomainError> {
        let len = self
            .queues
            .lock()
            .unwrap()
            .get(queue)
            .map_or(0, VecDeque::len);
        Ok(u64::try_from(len).unwrap_or(u64::MAX))
    }
}

struct InMemoryLease {
    queues: Queues,
    queue: String,
    message_id: Uuid,
    body: String,
    settled: bool,
}

impl InMemoryLease {
    fn unlease(&self) {
        if let Some(entries) = self.queues.lock().unwrap().get_mut(&self.queue) {
            if let Some(entry) = entries.iter_mut().find(|e| e.message_id == self.message_id) {
                entry.leased = false;
            }
        }
    }
}

#[async_trait]
impl MessageLease for InMemoryLease {
    fn message_id(&self) -> Uuid {
        self.message_id
    }

    fn body(&self) -> &str {
        &self.body
    }

    async fn acknowledge(self: Box<Self>) -> Result<(), DomainError> {
        let mut lease = self;
        if let Some(entries) = lease.queues.lock().unwrap().get_mut(&lease.queue) {
            entries.retain(|e| e.message_id != lease.message_id);
        }
        lease.settled = true;
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<(), DomainError> {
        let mut lease = self;
        lease.unlease();
        lease.settled = true;
        Ok(())
    }
}

impl Drop for InMemoryLease {
    fn drop(&mut self) {
        if !self.settled {
            self.unlease();
        }
    }
}
