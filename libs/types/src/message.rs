//! Core message carried by session send and receive packets

use bytes::Bytes;
use std::collections::BTreeMap;

/// A broker message as it travels through sessions and queues
///
/// The codec starts decoding session send/receive packets from an empty
/// shell produced by [`CoreMessage::shell`] and fills the fields in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CoreMessage {
    pub message_id: i64,
    /// Routing address; `None` until the producer or session default sets it
    pub address: Option<String>,
    pub durable: bool,
    pub priority: u8,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// String properties, kept ordered so encoding is deterministic
    pub properties: BTreeMap<String, String>,
    pub body: Bytes,
}

impl CoreMessage {
    /// Default priority for messages that do not set one
    pub const DEFAULT_PRIORITY: u8 = 4;

    /// Empty message shell used before decoding
    pub fn shell() -> Self {
        Self {
            priority: Self::DEFAULT_PRIORITY,
            ..Default::default()
        }
    }

    pub fn new(message_id: i64, address: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            message_id,
            address: Some(address.into()),
            body: body.into(),
            ..Self::shell()
        }
    }

    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn body_size(&self) -> usize {
        self.body.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_is_empty() {
        let shell = CoreMessage::shell();
        assert_eq!(shell.message_id, 0);
        assert!(shell.address.is_none());
        assert!(shell.body.is_empty());
        assert_eq!(shell.priority, CoreMessage::DEFAULT_PRIORITY);
    }

    #[test]
    fn test_builder_sets_fields() {
        let message = CoreMessage::new(7, "orders.new", &b"payload"[..])
            .with_durable(true)
            .with_priority(9)
            .with_property("region", "eu");

        assert_eq!(message.address(), Some("orders.new"));
        assert!(message.durable);
        assert_eq!(message.priority, 9);
        assert_eq!(message.properties.get("region").map(String::as_str), Some("eu"));
        assert_eq!(message.body_size(), 7);
    }
}
