//! Synchronisation error types

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Storage failure; the replication layer decides whether to abort the
    /// message or retry
    #[error("Large message {message_id}: {operation} failed: {source}")]
    Io {
        message_id: i64,
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Large message {message_id}: scratch buffer is empty")]
    EmptyScratchBuffer { message_id: i64 },
}

impl SyncError {
    /// Adapter for `map_err` that tags an I/O error with its operation
    pub fn io(message_id: i64, operation: &'static str) -> impl FnOnce(io::Error) -> SyncError {
        move |source| SyncError::Io {
            message_id,
            operation,
            source,
        }
    }

    pub fn message_id(&self) -> i64 {
        match self {
            SyncError::Io { message_id, .. } | SyncError::EmptyScratchBuffer { message_id } => {
                *message_id
            }
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
