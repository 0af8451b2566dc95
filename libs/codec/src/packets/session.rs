//! Session-data packets: consumers, acknowledgements, credits and message
//! transfer
//!
//! Send packets only decode on the server dispatcher and receive packets only
//! on the client dispatcher. Their factories hand out a pre-allocated
//! [`CoreMessage`] shell which the decoder then fills in.

use bytes::Bytes;
use types::CoreMessage;

define_packet! {
    SessionCreateConsumer = SessionCreateConsumer {
        id: i64,
        queue_name: String,
        filter: Option<String>,
        browse_only: bool,
        requires_response: bool,
    }
}

define_packet! {
    SessionAcknowledge = SessionAcknowledge {
        consumer_id: i64,
        message_id: i64,
        requires_response: bool,
    }
}

define_packet! {
    /// Ask which queues an address routes to
    SessionBindingQuery = SessionBindingQuery {
        address: String,
    }
}

define_packet! {
    SessionBindingQueryResponse = SessionBindingQueryResponse {
        exists: bool,
        queue_names: Vec<String>,
    }
}

define_packet! {
    SessionFlowCredit = SessionFlowCredit {
        consumer_id: i64,
        credits: i32,
    }
}

define_packet! {
    /// Publish a message held fully in memory
    SessionSend = SessionSend {
        message: CoreMessage,
        requires_response: bool,
    }
}

define_packet! {
    /// Start publishing a large message; the body follows in continuations
    SessionSendLarge = SessionSendLarge {
        message: CoreMessage,
    }
}

define_packet! {
    SessionSendContinuation = SessionSendContinuation {
        body: Bytes,
        continues: bool,
        requires_response: bool,
    }
}

define_packet! {
    SessionConsumerClose = SessionConsumerClose {
        consumer_id: i64,
    }
}

define_packet! {
    /// Deliver a message to a consumer
    SessionReceiveMessage = SessionReceiveMessage {
        consumer_id: i64,
        delivery_count: i32,
        message: CoreMessage,
    }
}

define_packet! {
    SessionReceiveLargeMessage = SessionReceiveLargeMessage {
        consumer_id: i64,
        delivery_count: i32,
        large_message_size: i64,
        message: CoreMessage,
    }
}

define_packet! {
    SessionReceiveContinuation = SessionReceiveContinuation {
        consumer_id: i64,
        body: Bytes,
        continues: bool,
    }
}

impl SessionSend {
    /// Empty packet around a pre-allocated message shell
    pub fn with_shell() -> Self {
        Self {
            message: CoreMessage::shell(),
            requires_response: false,
        }
    }
}

impl SessionSendLarge {
    pub fn with_shell() -> Self {
        Self {
            message: CoreMessage::shell(),
        }
    }
}

impl SessionReceiveMessage {
    pub fn with_shell() -> Self {
        Self {
            message: CoreMessage::shell(),
            ..Default::default()
        }
    }
}

impl SessionReceiveLargeMessage {
    pub fn with_shell() -> Self {
        Self {
            message: CoreMessage::shell(),
            ..Default::default()
        }
    }
}
