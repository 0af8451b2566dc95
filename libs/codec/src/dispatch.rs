//! # Packet Dispatch Tables
//!
//! Decoding starts from a type tag and needs an empty packet to populate.
//! A [`PacketDispatcher`] resolves the tag through an ordered list of
//! registrations, each covering a tag range with a factory. Registrations are
//! checked in the order they were added; a factory may decline a tag inside
//! its range (a gap in the family), in which case the search continues with
//! the next registration. Role dispatchers put their own registrations first
//! and chain the shared base registrations last:
//!
//! ```text
//! client: [session receive 75..=77] -> [base]
//! server: [session send 71..=73] -> [replication 90..=127] -> [base]
//! base:   [session control + plain session data]
//! ```
//!
//! Dispatchers are immutable once built. The three standard ones live in
//! process-wide statics and are shared by every connection without locking.
//! New packet families are added with [`PacketDispatcherBuilder::register`]
//! without touching existing registrations.

use crate::error::{CodecError, CodecResult};
use crate::packets::*;
use crate::wire::PacketReader;
use once_cell::sync::Lazy;
use std::fmt;
use std::ops::RangeInclusive;
use tracing::debug;
use types::{PacketType, ProtocolFamily};

/// Builds the empty packet for a tag, or declines it
pub type PacketFactory = fn(u8) -> Option<Packet>;

/// Which side of a connection a dispatcher decodes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatcherRole {
    Base,
    Client,
    Server,
    Custom(&'static str),
}

impl fmt::Display for DispatcherRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatcherRole::Base => write!(f, "base"),
            DispatcherRole::Client => write!(f, "client"),
            DispatcherRole::Server => write!(f, "server"),
            DispatcherRole::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// One (tag range, factory) pair
#[derive(Clone)]
pub struct Registration {
    pub name: &'static str,
    pub tags: RangeInclusive<u8>,
    pub factory: PacketFactory,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Ordered, immutable tag-to-factory table
#[derive(Debug, Clone)]
pub struct PacketDispatcher {
    role: DispatcherRole,
    registrations: Vec<Registration>,
}

/// Append-only builder for [`PacketDispatcher`]
#[derive(Debug)]
pub struct PacketDispatcherBuilder {
    role: DispatcherRole,
    registrations: Vec<Registration>,
}

impl PacketDispatcherBuilder {
    /// Add a registration after the ones already present
    pub fn register(
        mut self,
        name: &'static str,
        tags: RangeInclusive<u8>,
        factory: PacketFactory,
    ) -> Self {
        self.registrations.push(Registration {
            name,
            tags,
            factory,
        });
        self
    }

    /// Fall back to every registration of `fallback`, after the current ones
    pub fn chain(mut self, fallback: &PacketDispatcher) -> Self {
        self.registrations
            .extend(fallback.registrations.iter().cloned());
        self
    }

    pub fn build(self) -> PacketDispatcher {
        PacketDispatcher {
            role: self.role,
            registrations: self.registrations,
        }
    }
}

static BASE: Lazy<PacketDispatcher> = Lazy::new(|| {
    PacketDispatcher::builder(DispatcherRole::Base)
        .register("session-control", 10..=69, control_factory)
        .register("session-control-metadata", 104..=106, control_factory)
        .register("session-data", 40..=89, plain_session_data_factory)
        .build()
});

static CLIENT: Lazy<PacketDispatcher> = Lazy::new(|| {
    PacketDispatcher::builder(DispatcherRole::Client)
        .register("session-receive", 75..=77, session_receive_factory)
        .chain(&BASE)
        .build()
});

static SERVER: Lazy<PacketDispatcher> = Lazy::new(|| {
    PacketDispatcher::builder(DispatcherRole::Server)
        .register("session-send", 71..=73, session_send_factory)
        .register("replication", 90..=127, replication_factory)
        .chain(&BASE)
        .build()
});

impl PacketDispatcher {
    pub fn builder(role: DispatcherRole) -> PacketDispatcherBuilder {
        PacketDispatcherBuilder {
            role,
            registrations: Vec::new(),
        }
    }

    /// Tags common to both sides of a session
    pub fn base() -> &'static PacketDispatcher {
        &BASE
    }

    /// Client side: base plus message delivery packets
    pub fn client() -> &'static PacketDispatcher {
        &CLIENT
    }

    /// Server side: base plus publishing and replication packets
    pub fn server() -> &'static PacketDispatcher {
        &SERVER
    }

    pub fn role(&self) -> DispatcherRole {
        self.role
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Build the empty packet for `tag`
    pub fn create_packet(&self, tag: u8) -> CodecResult<Packet> {
        self.registrations
            .iter()
            .filter(|registration| registration.tags.contains(&tag))
            .find_map(|registration| (registration.factory)(tag))
            .ok_or_else(|| CodecError::unknown_packet_type(tag, self.role))
    }

    /// Whether some registration in the chain accepts `tag`
    pub fn recognizes(&self, tag: u8) -> bool {
        self.create_packet(tag).is_ok()
    }

    /// Decode one complete packet: tag, factory, then `decode_rest`
    ///
    /// The packet must consume `data` exactly; leftover bytes are malformed.
    pub fn decode(&self, data: &[u8]) -> CodecResult<Packet> {
        let mut reader = PacketReader::new(data);
        let tag = reader.read_tag()?;
        let mut packet = self.create_packet(tag).map_err(|e| {
            debug!(tag, role = %self.role, "no factory for packet tag");
            e
        })?;
        packet.decode_rest(&mut reader)?;
        reader.finish()?;
        Ok(packet)
    }
}

fn registered(tag: u8) -> Option<PacketType> {
    PacketType::try_from(tag).ok()
}

/// Session-control tags; every kind decodes from its default
fn control_factory(tag: u8) -> Option<Packet> {
    let packet_type = registered(tag)?;
    (packet_type.family() == ProtocolFamily::SessionControl)
        .then(|| Packet::default_for(packet_type))
}

/// Session-data tags that need no role-specific construction
fn plain_session_data_factory(tag: u8) -> Option<Packet> {
    match registered(tag)? {
        packet_type @ (PacketType::SessionCreateConsumer
        | PacketType::SessionAcknowledge
        | PacketType::SessionBindingQuery
        | PacketType::SessionBindingQueryResponse
        | PacketType::SessionFlowCredit
        | PacketType::SessionConsumerClose) => Some(Packet::default_for(packet_type)),
        _ => None,
    }
}

fn session_send_factory(tag: u8) -> Option<Packet> {
    match registered(tag)? {
        PacketType::SessionSend => Some(SessionSend::with_shell().into()),
        PacketType::SessionSendLarge => Some(SessionSendLarge::with_shell().into()),
        PacketType::SessionSendContinuation => Some(SessionSendContinuation::default().into()),
        _ => None,
    }
}

fn session_receive_factory(tag: u8) -> Option<Packet> {
    match registered(tag)? {
        PacketType::SessionReceiveMessage => Some(SessionReceiveMessage::with_shell().into()),
        PacketType::SessionReceiveLargeMessage => {
            Some(SessionReceiveLargeMessage::with_shell().into())
        }
        PacketType::SessionReceiveContinuation => {
            Some(SessionReceiveContinuation::default().into())
        }
        _ => None,
    }
}

fn replication_factory(tag: u8) -> Option<Packet> {
    let packet_type = registered(tag)?;
    (packet_type.family() == ProtocolFamily::Replication)
        .then(|| Packet::default_for(packet_type))
}
