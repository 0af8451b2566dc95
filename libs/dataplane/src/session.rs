//! # Server Session Handler
//!
//! Broker side of one client connection: decodes frames with the server
//! dispatcher and turns session packets into registry and queue operations.
//!
//! ## Packet Handling
//!
//! | packet                      | effect                                              | reply            |
//! |-----------------------------|-----------------------------------------------------|------------------|
//! | `CreateSession`             | session settings, transaction if not auto-commit    | `CreateSessionResponse` |
//! | `CreateQueue`               | queue endpoint + binding                            | `NullResponse` / `Exception` |
//! | `DeleteQueue`               | binding removal, joins the session transaction      | `NullResponse` / `Exception` |
//! | `SessionCommit`/`Rollback`  | resolve the session transaction                     | `NullResponse`   |
//! | `SessionBindingQuery`       | names of the bindings an address routes to          | `SessionBindingQueryResponse` |
//! | `SessionSend`               | route to every matching binding's queue             | if requested     |
//! | `SessionSendLarge` + continuations | assemble body, then route                    | if requested     |
//! | consumer packets            | consumer registry, credits, delivery polling        | if requested     |
//! | `Ping`                      | none                                                | `Ping` echo      |
//!
//! Replies to one-way packets are dropped (failures are logged instead).
//! A decode failure closes the session for good.

use crate::error::{DataplaneError, DataplaneResult};
use crate::frame::{encode_frame, Frame, FrameDecoder};
use crate::queue::QueueEndpoints;
use broker_config::BrokerConfig;
use bytes::{BufMut, BytesMut};
use codec::packets::{
    CreateQueue, CreateSession, CreateSessionResponse, DeleteQueue, Exception, NullResponse,
    Packet, SessionBindingQueryResponse, SessionCreateConsumer, SessionReceiveMessage,
};
use routing::{
    Binding, BindingRegistry, EndpointId, RoutingError, Transaction, TransactionOperation,
    WildcardSyntax,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use types::{exception_codes, CoreMessage, CONNECTION_CHANNEL_ID, DEFAULT_MAX_FRAME_SIZE, PROTOCOL_VERSION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Route by pattern matching; exact address lookup otherwise
    pub wildcard_routing: bool,
    /// Syntax for registries built from these options
    pub syntax: WildcardSyntax,
    pub max_frame_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            wildcard_routing: true,
            syntax: WildcardSyntax::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &BrokerConfig) -> Self {
        let w = &config.wildcard;
        Self {
            wildcard_routing: w.routing_enabled,
            syntax: WildcardSyntax::new(w.delimiter, w.single_word, w.any_words),
            max_frame_size: config.codec.max_frame_size,
        }
    }
}

#[derive(Debug)]
struct Consumer {
    queue_name: String,
    endpoint: EndpointId,
    /// Remaining byte credits; `None` means no flow control
    credits: Option<i64>,
}

/// Large message being assembled from continuations
#[derive(Debug)]
struct PendingLargeSend {
    message: CoreMessage,
    body: BytesMut,
}

/// Drops a deleted queue's endpoint once the removal commits
struct DropQueueOnCommit {
    queues: Arc<QueueEndpoints>,
    endpoint: EndpointId,
}

impl TransactionOperation for DropQueueOnCommit {
    fn after_commit(self: Box<Self>) {
        self.queues.remove(self.endpoint);
    }
}

pub struct ServerSession {
    registry: BindingRegistry,
    queues: Arc<QueueEndpoints>,
    options: SessionOptions,
    decoder: FrameDecoder,
    name: Option<String>,
    channel_id: i64,
    default_address: Option<String>,
    window_size: i32,
    transaction: Option<Transaction>,
    consumers: BTreeMap<i64, Consumer>,
    started: bool,
    large_send: Option<PendingLargeSend>,
    closed: bool,
}

fn exception(code: i32, message: impl Into<String>) -> Packet {
    Exception {
        code,
        message: Some(message.into()),
    }
    .into()
}

fn null_response() -> Option<Packet> {
    Some(NullResponse {}.into())
}

impl ServerSession {
    pub fn new(
        registry: BindingRegistry,
        queues: Arc<QueueEndpoints>,
        options: SessionOptions,
    ) -> Self {
        let decoder = FrameDecoder::server(options.max_frame_size);
        Self {
            registry,
            queues,
            options,
            decoder,
            name: None,
            channel_id: CONNECTION_CHANNEL_ID,
            default_address: None,
            window_size: -1,
            transaction: None,
            consumers: BTreeMap::new(),
            started: false,
            large_send: None,
            closed: false,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn channel_id(&self) -> i64 {
        self.channel_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_transacted(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Decode every complete frame in `input` and append the replies to
    /// `output`; returns the number of frames handled
    pub fn handle_bytes(&mut self, input: &mut BytesMut, output: &mut BytesMut) -> DataplaneResult<usize> {
        if self.closed {
            return Err(DataplaneError::Closed);
        }

        let mut handled = 0;
        while !self.closed {
            let frame = match self.decoder.decode(input) {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(handled),
                Err(e) => {
                    warn!("Closing session {:?}: {}", self.name, e);
                    self.closed = true;
                    return Err(e.into());
                }
            };
            if let Some(reply) = self.handle_frame(frame)? {
                encode_frame(&reply, output);
            }
            handled += 1;
        }
        Ok(handled)
    }

    /// Handle one frame; the reply goes back on the same channel
    pub fn handle_frame(&mut self, frame: Frame) -> DataplaneResult<Option<Frame>> {
        let channel_id = frame.channel_id;
        Ok(self
            .handle_packet(frame.packet)?
            .map(|packet| Frame { channel_id, packet }))
    }

    pub fn handle_packet(&mut self, packet: Packet) -> DataplaneResult<Option<Packet>> {
        if self.closed {
            return Err(DataplaneError::Closed);
        }

        let packet_type = packet.packet_type();
        let wants_reply = packet.requires_response() || matches!(packet, Packet::Ping(_));

        match self.dispatch(packet)? {
            Some(reply) if wants_reply => Ok(Some(reply)),
            Some(Packet::Exception(e)) => {
                warn!(
                    "{} failed without a reply channel: code {} {}",
                    packet_type,
                    e.code,
                    e.message.as_deref().unwrap_or("")
                );
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn dispatch(&mut self, packet: Packet) -> DataplaneResult<Option<Packet>> {
        match packet {
            Packet::Ping(ping) => Ok(Some(ping.into())),
            Packet::Disconnect(_) => {
                self.end_session()?;
                self.closed = true;
                info!("Session {:?} disconnected", self.name);
                Ok(None)
            }
            Packet::CreateSession(p) => self.create_session(p),
            Packet::CreateQueue(p) => self.create_queue(p),
            Packet::DeleteQueue(p) => self.delete_queue(p),
            Packet::SessionCommit(_) => {
                if let Some(tx) = self.transaction.take() {
                    tx.commit()?;
                    self.transaction = Some(Transaction::new());
                }
                Ok(null_response())
            }
            Packet::SessionRollback(_) => {
                if let Some(tx) = self.transaction.take() {
                    tx.rollback()?;
                    self.transaction = Some(Transaction::new());
                }
                Ok(null_response())
            }
            Packet::SessionStart(_) => {
                self.started = true;
                Ok(None)
            }
            Packet::SessionStop(_) => {
                self.started = false;
                Ok(None)
            }
            Packet::SessionClose(_) => {
                self.end_session()?;
                info!("Session {:?} closed", self.name);
                Ok(null_response())
            }
            Packet::SessionBindingQuery(p) => Ok(Some(self.binding_query(&p.address))),
            Packet::SessionSend(p) => Ok(self.route(p.message)),
            Packet::SessionSendLarge(p) => {
                if self.large_send.is_some() {
                    warn!("Large send started before the previous one finished; discarding it");
                }
                let body = BytesMut::from(&p.message.body[..]);
                self.large_send = Some(PendingLargeSend {
                    message: p.message,
                    body,
                });
                Ok(None)
            }
            Packet::SessionSendContinuation(p) => {
                let Some(pending) = self.large_send.as_mut() else {
                    return Ok(Some(exception(
                        exception_codes::ILLEGAL_STATE,
                        "continuation without a large send",
                    )));
                };
                pending.body.put_slice(&p.body);
                if p.continues {
                    return Ok(None);
                }
                match self.large_send.take() {
                    Some(PendingLargeSend { mut message, body }) => {
                        message.body = body.freeze();
                        Ok(self.route(message))
                    }
                    None => Ok(None),
                }
            }
            Packet::SessionCreateConsumer(p) => Ok(self.create_consumer(p)),
            Packet::SessionConsumerClose(p) => {
                if self.consumers.remove(&p.consumer_id).is_none() {
                    debug!("Close for unknown consumer {}", p.consumer_id);
                }
                Ok(None)
            }
            Packet::SessionFlowCredit(p) => {
                if let Some(consumer) = self.consumers.get_mut(&p.consumer_id) {
                    if let Some(credits) = consumer.credits.as_mut() {
                        *credits += i64::from(p.credits);
                    }
                }
                Ok(None)
            }
            Packet::SessionAcknowledge(p) => {
                debug!("Consumer {} acknowledged {}", p.consumer_id, p.message_id);
                Ok(null_response())
            }
            other => Err(DataplaneError::UnexpectedPacket {
                handler: "server session",
                packet_type: other.packet_type(),
            }),
        }
    }

    fn create_session(&mut self, p: CreateSession) -> DataplaneResult<Option<Packet>> {
        if p.version != PROTOCOL_VERSION {
            return Ok(Some(exception(
                exception_codes::ILLEGAL_STATE,
                format!("unsupported protocol version {}", p.version),
            )));
        }

        let transacted = !(p.auto_commit_sends && p.auto_commit_acks);
        self.transaction = transacted.then(Transaction::new);
        self.channel_id = p.session_channel_id;
        self.default_address = p.default_address;
        self.window_size = p.window_size;
        info!(
            "Session {} created on channel {} (transacted: {})",
            p.name, p.session_channel_id, transacted
        );
        self.name = Some(p.name);

        Ok(Some(
            CreateSessionResponse {
                server_version: PROTOCOL_VERSION,
            }
            .into(),
        ))
    }

    fn create_queue(&mut self, p: CreateQueue) -> DataplaneResult<Option<Packet>> {
        let queue = self.queues.create(p.queue_name.clone());
        let binding = Binding::with_syntax(
            p.queue_name.clone(),
            &p.address,
            queue.endpoint(),
            self.registry.syntax(),
        )
        .map(|b| b.with_filter(p.filter).with_durable(p.durable));

        let result = binding.and_then(|b| self.registry.add_binding(b));
        match result {
            Ok(_) => Ok(null_response()),
            Err(e) => {
                self.queues.remove(queue.endpoint());
                match e {
                    RoutingError::DuplicateBinding { name, .. } => Ok(Some(exception(
                        exception_codes::QUEUE_EXISTS,
                        format!("queue {} already exists", name),
                    ))),
                    RoutingError::InvalidAddressPattern => Ok(Some(exception(
                        exception_codes::INVALID_ADDRESS,
                        format!("invalid address for queue {}", p.queue_name),
                    ))),
                    other => Err(other.into()),
                }
            }
        }
    }

    fn delete_queue(&mut self, p: DeleteQueue) -> DataplaneResult<Option<Packet>> {
        let Some(binding) = self
            .registry
            .remove_binding(&p.queue_name, self.transaction.as_ref())?
        else {
            return Ok(Some(exception(
                exception_codes::QUEUE_DOES_NOT_EXIST,
                format!("queue {} does not exist", p.queue_name),
            )));
        };

        match &self.transaction {
            Some(tx) => tx.add_operation(Box::new(DropQueueOnCommit {
                queues: Arc::clone(&self.queues),
                endpoint: binding.endpoint(),
            }))?,
            None => {
                self.queues.remove(binding.endpoint());
            }
        }
        Ok(null_response())
    }

    /// Endpoints (deduplicated) and binding names for `address`
    fn lookup(&self, address: &str) -> Result<(Vec<EndpointId>, Vec<String>), RoutingError> {
        if self.options.wildcard_routing {
            let matched = self.registry.get_matching_bindings(address)?;
            Ok((matched.endpoints(), matched.names()))
        } else {
            Ok(self
                .registry
                .get_bindings_for_address(address)
                .map(|a| (a.endpoints(), a.names()))
                .unwrap_or_default())
        }
    }

    fn binding_query(&self, address: &str) -> Packet {
        let queue_names = self
            .lookup(address)
            .map(|(_, names)| names)
            .unwrap_or_default();
        SessionBindingQueryResponse {
            exists: !queue_names.is_empty(),
            queue_names,
        }
        .into()
    }

    fn route(&self, mut message: CoreMessage) -> Option<Packet> {
        let Some(address) = message.address.clone().or_else(|| self.default_address.clone()) else {
            return Some(exception(
                exception_codes::INVALID_ADDRESS,
                "message has no address",
            ));
        };

        let endpoints = match self.lookup(&address) {
            Ok((endpoints, _)) => endpoints,
            Err(e) => {
                return Some(exception(exception_codes::INVALID_ADDRESS, e.to_string()));
            }
        };

        message.address = Some(address);
        let mut delivered = 0;
        for endpoint in &endpoints {
            if self.queues.deliver(*endpoint, message.clone()) {
                delivered += 1;
            }
        }
        debug!(
            "Message {} to {:?} delivered to {} queues",
            message.message_id, message.address, delivered
        );
        null_response()
    }

    fn create_consumer(&mut self, p: SessionCreateConsumer) -> Option<Packet> {
        if p.browse_only {
            return Some(exception(
                exception_codes::ILLEGAL_STATE,
                "browse-only consumers are not supported",
            ));
        }
        let Some(binding) = self.registry.get_binding(&p.queue_name) else {
            return Some(exception(
                exception_codes::QUEUE_DOES_NOT_EXIST,
                format!("queue {} does not exist", p.queue_name),
            ));
        };

        let credits = (self.window_size >= 0).then_some(i64::from(self.window_size));
        self.consumers.insert(
            p.id,
            Consumer {
                queue_name: p.queue_name,
                endpoint: binding.endpoint(),
                credits,
            },
        );
        debug!("Consumer {} attached to {}", p.id, binding.name());
        null_response()
    }

    /// Pull queued messages for every consumer while the session is started
    /// and credits allow
    pub fn poll_deliveries(&mut self) -> Vec<Frame> {
        if !self.started || self.closed {
            return Vec::new();
        }

        let mut frames = Vec::new();
        for (consumer_id, consumer) in self.consumers.iter_mut() {
            let Some(queue) = self.queues.get(consumer.endpoint) else {
                debug!("Queue {} for consumer {} is gone", consumer.queue_name, consumer_id);
                continue;
            };
            while consumer.credits.map_or(true, |c| c > 0) {
                let Some(message) = queue.take(1).pop() else {
                    break;
                };
                if let Some(credits) = consumer.credits.as_mut() {
                    *credits -= message.body_size() as i64;
                }
                frames.push(Frame::new(
                    self.channel_id,
                    SessionReceiveMessage {
                        consumer_id: *consumer_id,
                        delivery_count: 1,
                        message,
                    },
                ));
            }
        }
        frames
    }

    /// Roll back open work and detach consumers
    fn end_session(&mut self) -> DataplaneResult<()> {
        self.consumers.clear();
        self.started = false;
        self.large_send = None;
        if let Some(tx) = self.transaction.take() {
            tx.rollback()?;
        }
        Ok(())
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        if let Some(tx) = self.transaction.take() {
            if let Err(e) = tx.rollback() {
                warn!("Rollback on session drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::packets::{
        Ping, ReplicationResponse, SessionFlowCredit, SessionSend, SessionStart,
    };

    fn session() -> ServerSession {
        ServerSession::new(
            BindingRegistry::new(),
            Arc::new(QueueEndpoints::new()),
            SessionOptions::default(),
        )
    }

    fn create_queue(name: &str, address: &str) -> Packet {
        CreateQueue {
            address: address.into(),
            queue_name: name.into(),
            filter: None,
            durable: false,
            temporary: false,
        }
        .into()
    }

    #[test]
    fn test_ping_is_echoed() {
        let mut s = session();
        let reply = s.handle_packet(Ping { connection_ttl: 5 }.into()).unwrap();
        assert_eq!(reply, Some(Ping { connection_ttl: 5 }.into()));
    }

    #[test]
    fn test_invalid_queue_address() {
        let mut s = session();
        let reply = s.handle_packet(create_queue("Q1", "")).unwrap();
        assert!(matches!(
            reply,
            Some(Packet::Exception(Exception { code: exception_codes::INVALID_ADDRESS, .. }))
        ));
        assert!(s.queues.is_empty());
    }

    #[test]
    fn test_one_way_failures_have_no_reply() {
        let mut s = session();
        let reply = s
            .handle_packet(
                SessionSend {
                    message: CoreMessage::shell(),
                    requires_response: false,
                }
                .into(),
            )
            .unwrap();
        assert_eq!(reply, None);
    }

    #[test]
    fn test_replication_packets_are_unexpected() {
        let mut s = session();
        let err = s
            .handle_packet(ReplicationResponse {}.into())
            .unwrap_err();
        assert!(matches!(err, DataplaneError::UnexpectedPacket { .. }));
        assert!(!err.is_fatal());
        assert!(!s.is_closed());
    }

    #[test]
    fn test_flow_credits_limit_delivery() {
        let mut s = session();
        s.handle_packet(
            CreateSession {
                name: "s".into(),
                session_channel_id: 10,
                version: PROTOCOL_VERSION,
                auto_commit_sends: true,
                auto_commit_acks: true,
                window_size: 0,
                ..CreateSession::default()
            }
            .into(),
        )
        .unwrap();
        s.handle_packet(create_queue("Q1", "a")).unwrap();
        s.handle_packet(
            SessionCreateConsumer {
                id: 1,
                queue_name: "Q1".into(),
                ..SessionCreateConsumer::default()
            }
            .into(),
        )
        .unwrap();
        for id in 0..3 {
            s.handle_packet(
                SessionSend {
                    message: CoreMessage::new(id, "a", vec![0u8; 10]),
                    requires_response: false,
                }
                .into(),
            )
            .unwrap();
        }

        s.handle_packet(SessionStart {}.into()).unwrap();
        assert!(s.poll_deliveries().is_empty());

        s.handle_packet(SessionFlowCredit { consumer_id: 1, credits: 15 }.into())
            .unwrap();
        let frames = s.poll_deliveries();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.channel_id == 10));
        assert!(s.poll_deliveries().is_empty());
    }
}
