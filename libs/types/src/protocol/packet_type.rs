//! # Packet Type Registry
//!
//! Every packet kind on the wire is identified by a single type tag byte. Tags
//! are permanently reserved: once a number is published it is never reused,
//! even after the packet kind is retired. New kinds are appended in the gaps
//! of their family's range.
//!
//! ## Tag Organization
//!
//! - **Session control (10-39, 43-44, 67-69, 104-106)**: connection liveness,
//!   session lifecycle and queue management
//! - **Session data (40-42, 45-66, 70-89)**: consumers, acknowledgements,
//!   credits and message transfer
//! - **Replication (90-103, 120-127)**: journal and large-message replication
//!   between a primary and its backup
//!
//! The family of a tag decides which dispatcher is allowed to decode it; see
//! the codec crate for the dispatch tables.

use num_enum::TryFromPrimitive;

/// Protocol family a packet tag belongs to
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtocolFamily {
    /// Connection and session lifecycle
    SessionControl = 1,

    /// Message transfer, consumers and flow control
    SessionData = 2,

    /// Primary to backup replication
    Replication = 3,
}

impl ProtocolFamily {
    /// Determine the family from a raw tag byte
    ///
    /// Returns `None` for tags outside every reserved range.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            10..=39 | 43..=44 | 67..=69 | 104..=106 => Some(ProtocolFamily::SessionControl),
            40..=42 | 45..=66 | 70..=89 => Some(ProtocolFamily::SessionData),
            90..=103 | 120..=127 => Some(ProtocolFamily::Replication),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProtocolFamily::SessionControl => "session-control",
            ProtocolFamily::SessionData => "session-data",
            ProtocolFamily::Replication => "replication",
        }
    }
}

/// Static metadata for a packet kind
#[derive(Debug, Clone)]
pub struct PacketTypeInfo {
    /// Wire tag
    pub tag: u8,
    /// Human-readable name for logging
    pub name: &'static str,
    /// Protocol family the tag is reserved in
    pub family: ProtocolFamily,
    /// Whether the packet embeds a core message that has to be pre-allocated
    /// before the rest of the fields can be decoded
    pub embeds_message: bool,
}

/// Wire tags of every packet kind understood by this broker
///
/// Numbers are part of the wire contract. Never renumber, never reuse.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketType {
    // Session control
    Ping = 10,
    Disconnect = 11,
    Exception = 20,
    NullResponse = 21,
    PacketsConfirmed = 22,
    CreateSession = 30,
    CreateSessionResponse = 31,
    CreateQueue = 34,
    DeleteQueue = 35,
    SessionCommit = 43,
    SessionRollback = 44,
    SessionStart = 67,
    SessionStop = 68,
    SessionClose = 69,

    // Session data
    SessionCreateConsumer = 40,
    SessionAcknowledge = 41,
    SessionBindingQuery = 49,
    SessionBindingQueryResponse = 50,
    SessionFlowCredit = 70,
    SessionSend = 71,
    SessionSendLarge = 72,
    SessionSendContinuation = 73,
    SessionConsumerClose = 74,
    SessionReceiveMessage = 75,
    SessionReceiveLargeMessage = 76,
    SessionReceiveContinuation = 77,

    // Replication
    ReplicationResponse = 90,
    ReplicationAppend = 91,
    ReplicationDelete = 93,
    ReplicationCommitRollback = 96,
    ReplicationLargeMessageBegin = 99,
    ReplicationLargeMessageEnd = 100,
    ReplicationLargeMessageWrite = 101,
    ReplicationSyncFile = 103,
    ReplicationStartFinishSync = 120,
}

impl PacketType {
    /// Every registered packet type, in tag order
    pub const ALL: [PacketType; 35] = [
        PacketType::Ping,
        PacketType::Disconnect,
        PacketType::Exception,
        PacketType::NullResponse,
        PacketType::PacketsConfirmed,
        PacketType::CreateSession,
        PacketType::CreateSessionResponse,
        PacketType::CreateQueue,
        PacketType::DeleteQueue,
        PacketType::SessionCreateConsumer,
        PacketType::SessionAcknowledge,
        PacketType::SessionCommit,
        PacketType::SessionRollback,
        PacketType::SessionBindingQuery,
        PacketType::SessionBindingQueryResponse,
        PacketType::SessionStart,
        PacketType::SessionStop,
        PacketType::SessionClose,
        PacketType::SessionFlowCredit,
        PacketType::SessionSend,
        PacketType::SessionSendLarge,
        PacketType::SessionSendContinuation,
        PacketType::SessionConsumerClose,
        PacketType::SessionReceiveMessage,
        PacketType::SessionReceiveLargeMessage,
        PacketType::SessionReceiveContinuation,
        PacketType::ReplicationResponse,
        PacketType::ReplicationAppend,
        PacketType::ReplicationDelete,
        PacketType::ReplicationCommitRollback,
        PacketType::ReplicationLargeMessageBegin,
        PacketType::ReplicationLargeMessageEnd,
        PacketType::ReplicationLargeMessageWrite,
        PacketType::ReplicationSyncFile,
        PacketType::ReplicationStartFinishSync,
    ];

    /// Raw wire tag
    #[inline]
    pub fn tag(&self) -> u8 {
        *self as u8
    }

    /// Protocol family this tag is reserved in
    pub fn family(&self) -> ProtocolFamily {
        // Every variant sits inside a reserved range; the fallback only guards
        // against a tag being added outside of them.
        ProtocolFamily::from_tag(self.tag()).unwrap_or(ProtocolFamily::SessionControl)
    }

    /// True for kinds whose decoding starts from a pre-allocated message shell
    pub fn embeds_message(&self) -> bool {
        matches!(
            self,
            PacketType::SessionSend
                | PacketType::SessionSendLarge
                | PacketType::SessionReceiveMessage
                | PacketType::SessionReceiveLargeMessage
        )
    }

    pub fn type_info(&self) -> PacketTypeInfo {
        PacketTypeInfo {
            tag: self.tag(),
            name: self.name(),
            family: self.family(),
            embeds_message: self.embeds_message(),
        }
    }

    /// All packet types reserved in a family
    pub fn types_in_family(family: ProtocolFamily) -> Vec<PacketType> {
        Self::ALL
            .iter()
            .copied()
            .filter(|t| t.family() == family)
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            PacketType::Ping => "Ping",
            PacketType::Disconnect => "Disconnect",
            PacketType::Exception => "Exception",
            PacketType::NullResponse => "NullResponse",
            PacketType::PacketsConfirmed => "PacketsConfirmed",
            PacketType::CreateSession => "CreateSession",
            PacketType::CreateSessionResponse => "CreateSessionResponse",
            PacketType::CreateQueue => "CreateQueue",
            PacketType::DeleteQueue => "DeleteQueue",
            PacketType::SessionCommit => "SessionCommit",
            PacketType::SessionRollback => "SessionRollback",
            PacketType::SessionStart => "SessionStart",
            PacketType::SessionStop => "SessionStop",
            PacketType::SessionClose => "SessionClose",
            PacketType::SessionCreateConsumer => "SessionCreateConsumer",
            PacketType::SessionAcknowledge => "SessionAcknowledge",
            PacketType::SessionBindingQuery => "SessionBindingQuery",
            PacketType::SessionBindingQueryResponse => "SessionBindingQueryResponse",
            PacketType::SessionFlowCredit => "SessionFlowCredit",
            PacketType::SessionSend => "SessionSend",
            PacketType::SessionSendLarge => "SessionSendLarge",
            PacketType::SessionSendContinuation => "SessionSendContinuation",
            PacketType::SessionConsumerClose => "SessionConsumerClose",
            PacketType::SessionReceiveMessage => "SessionReceiveMessage",
            PacketType::SessionReceiveLargeMessage => "SessionReceiveLargeMessage",
            PacketType::SessionReceiveContinuation => "SessionReceiveContinuation",
            PacketType::ReplicationResponse => "ReplicationResponse",
            PacketType::ReplicationAppend => "ReplicationAppend",
            PacketType::ReplicationDelete => "ReplicationDelete",
            PacketType::ReplicationCommitRollback => "ReplicationCommitRollback",
            PacketType::ReplicationLargeMessageBegin => "ReplicationLargeMessageBegin",
            PacketType::ReplicationLargeMessageEnd => "ReplicationLargeMessageEnd",
            PacketType::ReplicationLargeMessageWrite => "ReplicationLargeMessageWrite",
            PacketType::ReplicationSyncFile => "ReplicationSyncFile",
            PacketType::ReplicationStartFinishSync => "ReplicationStartFinishSync",
        }
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_all_tags_unique_and_convertible() {
        let mut seen = HashSet::new();
        for packet_type in PacketType::ALL {
            assert!(seen.insert(packet_type.tag()), "duplicate tag {}", packet_type);
            assert_eq!(PacketType::try_from(packet_type.tag()).unwrap(), packet_type);
        }
        assert_eq!(seen.len(), PacketType::ALL.len());
    }

    #[test]
    fn test_every_type_inside_a_reserved_range() {
        for packet_type in PacketType::ALL {
            assert!(
                ProtocolFamily::from_tag(packet_type.tag()).is_some(),
                "{} is outside every family range",
                packet_type
            );
        }
    }

    #[test]
    fn test_family_assignment() {
        assert_eq!(PacketType::Ping.family(), ProtocolFamily::SessionControl);
        assert_eq!(PacketType::SessionCommit.family(), ProtocolFamily::SessionControl);
        assert_eq!(PacketType::SessionSend.family(), ProtocolFamily::SessionData);
        assert_eq!(
            PacketType::ReplicationLargeMessageWrite.family(),
            ProtocolFamily::Replication
        );
        assert_eq!(
            PacketType::ReplicationStartFinishSync.family(),
            ProtocolFamily::Replication
        );
        assert_eq!(ProtocolFamily::from_tag(0), None);
        assert_eq!(ProtocolFamily::from_tag(255), None);
    }

    #[test]
    fn test_unregistered_tag_rejected() {
        assert!(PacketType::try_from(92u8).is_err());
        assert!(PacketType::try_from(0u8).is_err());
    }

    #[test]
    fn test_types_in_family() {
        let replication = PacketType::types_in_family(ProtocolFamily::Replication);
        assert_eq!(replication.len(), 9);
        assert!(replication.contains(&PacketType::ReplicationSyncFile));
        assert!(!replication.contains(&PacketType::SessionSend));
    }
}
