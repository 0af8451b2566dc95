use codec::CodecError;
use replication::SyncError;
use routing::{RoutingError, TransactionError};
use thiserror::Error;
use types::PacketType;

#[derive(Debug, Error)]
pub enum DataplaneError {
    /// Unknown or malformed input; the connection must be torn down
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Replication sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("{handler} does not handle {packet_type}")]
    UnexpectedPacket {
        handler: &'static str,
        packet_type: PacketType,
    },

    #[error("Connection is closed")]
    Closed,
}

impl DataplaneError {
    /// Whether the connection that produced this error is unusable
    pub fn is_fatal(&self) -> bool {
        match self {
            DataplaneError::Codec(e) => e.is_fatal(),
            DataplaneError::Closed => true,
            _ => false,
        }
    }
}

pub type DataplaneResult<T> = Result<T, DataplaneError>;
