//! Protocol-level types shared by the codec and the data plane

pub mod constants;
pub mod packet_type;

pub use constants::*;
pub use packet_type::{PacketType, PacketTypeInfo, ProtocolFamily};
