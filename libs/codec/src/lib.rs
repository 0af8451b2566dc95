//! # Broker Packet Codec
//!
//! ## Purpose
//!
//! Encoding and decoding rules for every packet of the broker protocol:
//! session control, session data and replication. A packet on the wire is a
//! one-byte type tag followed by the fields of that kind in a fixed order.
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → dataplane (frames, sessions, replication endpoint)
//!     ↑           ↓
//! PacketType   PacketDispatcher: tag → factory → decode_rest
//! CoreMessage  Packet::encode:   tag → encode_rest
//! ```
//!
//! ## What This Crate Contains
//! - [`Packet`]: tagged union over every packet struct
//! - [`PacketDispatcher`]: immutable tag-range → factory chains for the base,
//!   client and server roles, extensible through [`PacketDispatcherBuilder`]
//! - [`wire`]: field layout (big-endian integers, length-prefixed strings)
//! - [`CodecError`]: unknown tag and malformed packet, both fatal for the
//!   connection
//!
//! ## What This Crate Does NOT Contain
//! - Stream framing and channel ids (belongs in the data plane)
//! - Reacting to packets

pub mod dispatch;
pub mod error;
pub mod packets;
pub mod wire;

pub use dispatch::{DispatcherRole, PacketDispatcher, PacketDispatcherBuilder, PacketFactory, Registration};
pub use error::{CodecError, CodecResult};
pub use packets::*;
pub use wire::{PacketReader, WireField};

use bytes::BytesMut;

/// Append `packet` (tag and fields) to `out`
pub fn encode_packet(packet: &Packet, out: &mut BytesMut) {
    packet.encode(out);
}

/// Decode exactly one packet using `dispatcher`
pub fn decode_packet(dispatcher: &PacketDispatcher, data: &[u8]) -> CodecResult<Packet> {
    dispatcher.decode(data)
}
