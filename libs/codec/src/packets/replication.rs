//! Replication packets exchanged between a primary and its backup
//!
//! Large-message packets carry the message id of the body being streamed;
//! chunks for one id arrive in send order on the replication channel.

use bytes::Bytes;

define_packet! {
    /// Acknowledges any replication packet
    ReplicationResponse = ReplicationResponse {}
}

define_packet! {
    /// Journal record append (or update when `is_update`)
    ReplicationAppend = ReplicationAppend {
        journal_id: u8,
        is_update: bool,
        record_id: i64,
        record_type: u8,
        record: Bytes,
    }
}

define_packet! {
    ReplicationDelete = ReplicationDelete {
        journal_id: u8,
        record_id: i64,
    }
}

define_packet! {
    ReplicationCommitRollback = ReplicationCommitRollback {
        journal_id: u8,
        commit: bool,
        tx_id: i64,
    }
}

define_packet! {
    /// A large message was created on the primary
    ReplicationLargeMessageBegin = ReplicationLargeMessageBegin {
        message_id: i64,
        header: Bytes,
    }
}

define_packet! {
    /// The primary finished with a large message
    ///
    /// `is_delete` means the body must be removed from the backup; otherwise
    /// the backup only releases its handles.
    ReplicationLargeMessageEnd = ReplicationLargeMessageEnd {
        message_id: i64,
        pending_record_id: i64,
        is_delete: bool,
    }
}

define_packet! {
    /// One body chunk of a large message
    ReplicationLargeMessageWrite = ReplicationLargeMessageWrite {
        message_id: i64,
        body: Bytes,
    }
}

define_packet! {
    /// Initial synchronisation: a slice of one of the primary's files
    ReplicationSyncFile = ReplicationSyncFile {
        file_id: i64,
        /// See `types::sync_file_kind`
        file_kind: u8,
        data: Bytes,
    }
}

define_packet! {
    /// Start (`finished == false`) or end of the initial file synchronisation
    ReplicationStartFinishSync = ReplicationStartFinishSync {
        finished: bool,
        node_id: String,
        file_ids: Vec<i64>,
    }
}
