//! # Broker Wire Types
//!
//! Pure data definitions shared by every crate that speaks the broker
//! protocol. Encoding rules live in the `codec` crate; this crate only names
//! things.
//!
//! ## Contents
//!
//! - [`PacketType`]: permanently reserved one-byte packet tags
//! - [`ProtocolFamily`]: partition of the tag space (session control,
//!   session data, replication)
//! - [`CoreMessage`]: the message embedded in session send/receive packets
//! - Wire constants (frame sizes, reserved channels, exception codes)

pub mod message;
pub mod protocol;

pub use message::CoreMessage;
pub use protocol::{constants::*, PacketType, PacketTypeInfo, ProtocolFamily};
