//! Wire constants shared by every protocol family
//!
//! Byte order is fixed once for the whole protocol: all multi-byte integers
//! are big-endian (network order). Strings and byte arrays carry a `u32`
//! length prefix.

/// Protocol version announced in `CreateSession`
pub const PROTOCOL_VERSION: i32 = 1;

/// Bytes used by a frame's length prefix
pub const FRAME_LENGTH_SIZE: usize = 4;

/// Bytes used by the channel id every frame carries after its length
pub const CHANNEL_ID_SIZE: usize = 8;

/// Bytes used by a packet's type tag
pub const TAG_SIZE: usize = 1;

/// Smallest legal frame body: channel id plus tag
pub const MIN_FRAME_BODY: usize = CHANNEL_ID_SIZE + TAG_SIZE;

/// Default upper bound for a single frame body (10 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Channel reserved for connection-level packets (ping, disconnect, create session)
pub const CONNECTION_CHANNEL_ID: i64 = 1;

/// Channel reserved for the replication stream
pub const REPLICATION_CHANNEL_ID: i64 = 2;

/// Exception codes carried by the `Exception` packet
pub mod exception_codes {
    pub const INTERNAL_ERROR: i32 = 0;
    pub const QUEUE_EXISTS: i32 = 101;
    pub const QUEUE_DOES_NOT_EXIST: i32 = 100;
    pub const INVALID_ADDRESS: i32 = 119;
    pub const ILLEGAL_STATE: i32 = 102;
}

/// Kinds of file carried by `ReplicationSyncFile`
pub mod sync_file_kind {
    pub const JOURNAL: u8 = 0;
    pub const LARGE_MESSAGE: u8 = 1;
    pub const PAGE: u8 = 2;
}
