//! Shared state behind every server session of one broker

use crate::queue::QueueEndpoints;
use crate::session::{ServerSession, SessionOptions};
use broker_config::BrokerConfig;
use routing::BindingRegistry;
use std::sync::Arc;

/// Binding registry and queue endpoints shared by the sessions it opens
#[derive(Debug, Clone)]
pub struct Broker {
    registry: BindingRegistry,
    queues: Arc<QueueEndpoints>,
    options: SessionOptions,
}

impl Broker {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            registry: BindingRegistry::with_syntax(options.syntax.clone()),
            queues: Arc::new(QueueEndpoints::new()),
            options,
        }
    }

    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new(SessionOptions::from_config(config))
    }

    pub fn open_session(&self) -> ServerSession {
        ServerSession::new(
            self.registry.clone(),
            Arc::clone(&self.queues),
            self.options.clone(),
        )
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    pub fn queues(&self) -> &Arc<QueueEndpoints> {
        &self.queues
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}
