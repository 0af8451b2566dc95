//! In-memory queue endpoints that bindings route to

use dashmap::DashMap;
use parking_lot::Mutex;
use routing::EndpointId;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use types::CoreMessage;

#[derive(Debug)]
pub struct Queue {
    name: String,
    endpoint: EndpointId,
    messages: Mutex<VecDeque<CoreMessage>>,
}

impl Queue {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    pub fn push(&self, message: CoreMessage) {
        self.messages.lock().push_back(message);
    }

    /// Remove up to `max` messages from the head
    pub fn take(&self, max: usize) -> Vec<CoreMessage> {
        let mut messages = self.messages.lock();
        let n = max.min(messages.len());
        messages.drain(..n).collect()
    }

    pub fn depth(&self) -> usize {
        self.messages.lock().len()
    }
}

/// Endpoint id → queue
#[derive(Debug)]
pub struct QueueEndpoints {
    queues: DashMap<EndpointId, Arc<Queue>>,
    next_id: AtomicU64,
}

impl QueueEndpoints {
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// New queue under a fresh endpoint id
    pub fn create(&self, name: impl Into<String>) -> Arc<Queue> {
        let endpoint = EndpointId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let queue = Arc::new(Queue {
            name: name.into(),
            endpoint,
            messages: Mutex::new(VecDeque::new()),
        });
        self.queues.insert(endpoint, Arc::clone(&queue));
        debug!("Created queue {} as {}", queue.name(), endpoint);
        queue
    }

    pub fn get(&self, endpoint: EndpointId) -> Option<Arc<Queue>> {
        self.queues.get(&endpoint).map(|q| Arc::clone(q.value()))
    }

    pub fn remove(&self, endpoint: EndpointId) -> Option<Arc<Queue>> {
        self.queues.remove(&endpoint).map(|(_, queue)| queue)
    }

    /// Enqueue on `endpoint`; false when no such queue exists
    pub fn deliver(&self, endpoint: EndpointId, message: CoreMessage) -> bool {
        match self.queues.get(&endpoint) {
            Some(queue) => {
                queue.push(message);
                true
            }
            None => false,
        }
    }

    pub fn drain(&self, endpoint: EndpointId) -> Vec<CoreMessage> {
        self.get(endpoint)
            .map(|queue| queue.take(usize::MAX))
            .unwrap_or_default()
    }

    pub fn depth(&self, endpoint: EndpointId) -> usize {
        self.queues.get(&endpoint).map_or(0, |q| q.depth())
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

impl Default for QueueEndpoints {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_deliver_and_drain_in_order() {
        let queues = QueueEndpoints::new();
        let q = queues.create("Q1");

        for id in 1..=3 {
            assert!(queues.deliver(q.endpoint(), CoreMessage::new(id, "a", Bytes::new())));
        }
        assert_eq!(queues.depth(q.endpoint()), 3);

        let first = q.take(1);
        assert_eq!(first[0].message_id, 1);
        let rest: Vec<i64> = queues.drain(q.endpoint()).iter().map(|m| m.message_id).collect();
        assert_eq!(rest, vec![2, 3]);
        assert_eq!(queues.depth(q.endpoint()), 0);
    }

    #[test]
    fn test_unknown_endpoint() {
        let queues = QueueEndpoints::new();
        assert!(!queues.deliver(EndpointId(99), CoreMessage::shell()));
        assert!(queues.drain(EndpointId(99)).is_empty());
        assert!(queues.remove(EndpointId(99)).is_none());
    }

    #[test]
    fn test_endpoint_ids_are_unique() {
        let queues = QueueEndpoints::new();
        let a = queues.create("A");
        let b = queues.create("A");
        assert_ne!(a.endpoint(), b.endpoint());
        assert_eq!(queues.len(), 2);
    }
}
