//! # Packet Definitions
//!
//! One struct per packet kind, each with a permanently reserved tag from
//! [`types::PacketType`]. The [`Packet`] enum is the tagged union the
//! dispatchers hand out; [`PacketBody`] is the per-kind contract:
//!
//! - `Default` produces the empty instance a factory returns
//! - `encode_rest` writes every field after the tag
//! - `decode_rest` reads the same fields back in the same order
//!
//! Structs are declared with `define_packet!`, which derives equality and
//! hashing over every field and generates both directions of the field codec
//! from a single field list, so the encode and decode orders cannot drift.

use crate::error::CodecResult;
use crate::wire::PacketReader;
use bytes::{BufMut, BytesMut};
use types::PacketType;

/// Per-kind encode/decode contract
pub trait PacketBody: Default {
    const TYPE: PacketType;

    /// Write every field after the tag
    fn encode_rest(&self, out: &mut BytesMut);

    /// Populate fields from the bytes following the tag
    fn decode_rest(&mut self, reader: &mut PacketReader<'_>) -> CodecResult<()>;
}

/// Declare a packet struct and its field codec
///
/// ```ignore
/// define_packet! {
///     /// Keep-alive
///     Ping = Ping {
///         connection_ttl: i64,
///     }
/// }
/// ```
macro_rules! define_packet {
    (
        $(#[$meta:meta])*
        $name:ident = $packet_type:ident {
            $(
                $(#[$field_meta:meta])*
                $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                pub $field: $ty,
            )*
        }

        impl $crate::packets::PacketBody for $name {
            const TYPE: ::types::PacketType = ::types::PacketType::$packet_type;

            #[allow(unused_variables)]
            fn encode_rest(&self, out: &mut ::bytes::BytesMut) {
                $( $crate::wire::WireField::write_to(&self.$field, out); )*
            }

            #[allow(unused_variables)]
            fn decode_rest(
                &mut self,
                reader: &mut $crate::wire::PacketReader<'_>,
            ) -> $crate::error::CodecResult<()> {
                $(
                    $crate::wire::WireField::read_into(
                        &mut self.$field,
                        reader,
                        stringify!($field),
                    )?;
                )*
                Ok(())
            }
        }
    };
}

pub mod control;
pub mod replication;
pub mod session;

pub use control::*;
pub use replication::*;
pub use session::*;

/// Generate the [`Packet`] union over every packet struct
///
/// Variant names, struct names and `PacketType` variants are the same
/// identifier.
macro_rules! packet_union {
    ($($kind:ident),* $(,)?) => {
        /// Any decoded packet
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum Packet {
            $( $kind($kind), )*
        }

        impl Packet {
            /// Tag of this packet
            pub fn packet_type(&self) -> PacketType {
                match self {
                    $( Packet::$kind(_) => PacketType::$kind, )*
                }
            }

            /// Empty instance for a packet type
            pub fn default_for(packet_type: PacketType) -> Packet {
                match packet_type {
                    $( PacketType::$kind => Packet::$kind($kind::default()), )*
                }
            }

            /// Write every field after the tag
            pub fn encode_rest(&self, out: &mut BytesMut) {
                match self {
                    $( Packet::$kind(p) => p.encode_rest(out), )*
                }
            }

            /// Populate fields from the bytes following the tag
            pub fn decode_rest(&mut self, reader: &mut PacketReader<'_>) -> CodecResult<()> {
                match self {
                    $( Packet::$kind(p) => p.decode_rest(reader), )*
                }
            }
        }

        $(
            impl From<$kind> for Packet {
                fn from(packet: $kind) -> Self {
                    Packet::$kind(packet)
                }
            }
        )*
    };
}

packet_union! {
    // Session control
    Ping,
    Disconnect,
    Exception,
    NullResponse,
    PacketsConfirmed,
    CreateSession,
    CreateSessionResponse,
    CreateQueue,
    DeleteQueue,
    SessionCommit,
    SessionRollback,
    SessionStart,
    SessionStop,
    SessionClose,
    // Session data
    SessionCreateConsumer,
    SessionAcknowledge,
    SessionBindingQuery,
    SessionBindingQueryResponse,
    SessionFlowCredit,
    SessionSend,
    SessionSendLarge,
    SessionSendContinuation,
    SessionConsumerClose,
    SessionReceiveMessage,
    SessionReceiveLargeMessage,
    SessionReceiveContinuation,
    // Replication
    ReplicationResponse,
    ReplicationAppend,
    ReplicationDelete,
    ReplicationCommitRollback,
    ReplicationLargeMessageBegin,
    ReplicationLargeMessageEnd,
    ReplicationLargeMessageWrite,
    ReplicationSyncFile,
    ReplicationStartFinishSync,
}

impl Packet {
    /// Tag followed by every field
    pub fn encode(&self, out: &mut BytesMut) {
        out.put_u8(self.packet_type().tag());
        self.encode_rest(out);
    }

    /// Encode into a fresh buffer
    pub fn to_bytes(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(64);
        self.encode(&mut out);
        out
    }

    /// True for packets that expect a response on the same channel
    pub fn requires_response(&self) -> bool {
        match self {
            Packet::SessionSend(p) => p.requires_response,
            Packet::SessionSendContinuation(p) => p.requires_response,
            Packet::SessionCreateConsumer(p) => p.requires_response,
            Packet::SessionAcknowledge(p) => p.requires_response,
            Packet::CreateSession(_)
            | Packet::CreateQueue(_)
            | Packet::DeleteQueue(_)
            | Packet::SessionBindingQuery(_)
            | Packet::SessionCommit(_)
            | Packet::SessionRollback(_)
            | Packet::SessionClose(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_for_matches_packet_type() {
        for packet_type in PacketType::ALL {
            assert_eq!(Packet::default_for(packet_type).packet_type(), packet_type);
        }
    }

    #[test]
    fn test_encode_starts_with_tag() {
        let packet = Packet::from(Ping { connection_ttl: 60_000 });
        let bytes = packet.to_bytes();
        assert_eq!(bytes[0], PacketType::Ping.tag());
        assert_eq!(bytes.len(), 1 + 8);
    }

    #[test]
    fn test_empty_packet_is_tag_only() {
        let packet = Packet::from(SessionStart::default());
        assert_eq!(&packet.to_bytes()[..], &[PacketType::SessionStart.tag()]);
    }
}
