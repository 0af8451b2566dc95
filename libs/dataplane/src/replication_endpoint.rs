//! Backup side of the replication channel
//!
//! Tracks one [`ReplicatedLargeMessage`] per large message the primary is
//! streaming and drives its sync state machine from replication packets.
//! Journal packets are acknowledged only; journals are not kept here.

use crate::error::{DataplaneError, DataplaneResult};
use crate::frame::{encode_frame, Frame, FrameDecoder};
use broker_config::BrokerConfig;
use bytes::BytesMut;
use codec::packets::{
    Packet, ReplicationLargeMessageEnd, ReplicationResponse, ReplicationStartFinishSync,
    ReplicationSyncFile,
};
use replication::{FileStorageManager, ReplicatedLargeMessage, StorageManager, SyncResult};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use tracing::{debug, info, warn};
use types::{sync_file_kind, DEFAULT_MAX_FRAME_SIZE};

pub const DEFAULT_SCRATCH_SIZE: usize = 100 * 1024;

pub struct ReplicationEndpoint {
    storage: Arc<dyn StorageManager>,
    messages: HashMap<i64, ReplicatedLargeMessage>,
    /// Ids the primary has ended; late chunks for them are dropped
    ended: HashSet<i64>,
    /// Copy buffer shared by every merge
    scratch: Vec<u8>,
    decoder: FrameDecoder,
    closed: bool,
}

impl ReplicationEndpoint {
    pub fn new(storage: Arc<dyn StorageManager>, scratch_size: usize, max_frame_size: usize) -> Self {
        Self {
            storage,
            messages: HashMap::new(),
            ended: HashSet::new(),
            scratch: vec![0u8; scratch_size],
            decoder: FrameDecoder::server(max_frame_size),
            closed: false,
        }
    }

    /// File-backed endpoint rooted at the configured large message directory
    pub fn from_config(config: &BrokerConfig) -> io::Result<Self> {
        let storage = FileStorageManager::new(config.replication.large_message_dir.clone())?;
        info!(
            "Replication endpoint storing large messages in {:?}",
            storage.directory()
        );
        Ok(Self::new(
            Arc::new(storage),
            config.replication.scratch_buffer_size,
            config.codec.max_frame_size,
        ))
    }

    pub fn with_storage(storage: Arc<dyn StorageManager>) -> Self {
        Self::new(storage, DEFAULT_SCRATCH_SIZE, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn tracked(&self, message_id: i64) -> Option<&ReplicatedLargeMessage> {
        self.messages.get(&message_id)
    }

    pub fn tracked_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Decode and handle every complete frame, appending acknowledgements
    pub fn handle_bytes(&mut self, input: &mut BytesMut, output: &mut BytesMut) -> DataplaneResult<usize> {
        if self.closed {
            return Err(DataplaneError::Closed);
        }

        let mut handled = 0;
        loop {
            let frame = match self.decoder.decode(input) {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(handled),
                Err(e) => {
                    warn!("Closing replication channel: {}", e);
                    self.closed = true;
                    return Err(e.into());
                }
            };
            let reply = self.handle_packet(frame.packet)?;
            encode_frame(&Frame::new(frame.channel_id, reply), output);
            handled += 1;
        }
    }

    pub fn handle_packet(&mut self, packet: Packet) -> DataplaneResult<Packet> {
        if self.closed {
            return Err(DataplaneError::Closed);
        }

        match packet {
            Packet::ReplicationLargeMessageBegin(p) => {
                if self.messages.contains_key(&p.message_id) {
                    warn!("Large message {} began twice; keeping the first", p.message_id);
                } else {
                    let message = ReplicatedLargeMessage::new(p.message_id, Arc::clone(&self.storage))?;
                    self.ended.remove(&p.message_id);
                    self.messages.insert(p.message_id, message);
                }
            }
            Packet::ReplicationLargeMessageWrite(p) => {
                let Some(message) = self.messages.get(&p.message_id) else {
                    debug!(
                        "Dropping {} bytes for untracked large message {}",
                        p.body.len(),
                        p.message_id
                    );
                    return Ok(ReplicationResponse {}.into());
                };
                let result = message.add_bytes(&p.body);
                self.abort_on_error(p.message_id, result)?;
            }
            Packet::ReplicationSyncFile(p) => self.sync_file(p)?,
            Packet::ReplicationStartFinishSync(p) => self.start_finish_sync(p)?,
            Packet::ReplicationLargeMessageEnd(p) => self.end(p)?,
            Packet::ReplicationAppend(_)
            | Packet::ReplicationDelete(_)
            | Packet::ReplicationCommitRollback(_) => {}
            other => {
                return Err(DataplaneError::UnexpectedPacket {
                    handler: "replication endpoint",
                    packet_type: other.packet_type(),
                })
            }
        }
        Ok(ReplicationResponse {}.into())
    }

    fn get_or_create(&mut self, message_id: i64) -> SyncResult<&ReplicatedLargeMessage> {
        match self.messages.entry(message_id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                debug!("Large message {} first seen mid-stream", message_id);
                let message = ReplicatedLargeMessage::new(message_id, Arc::clone(&self.storage))?;
                Ok(entry.insert(message))
            }
        }
    }

    /// Drop a message whose sync failed, removing whatever reached disk
    fn abort_on_error(&mut self, message_id: i64, result: SyncResult<()>) -> DataplaneResult<()> {
        let Err(e) = result else {
            return Ok(());
        };
        warn!("Aborting large message {}: {}", message_id, e);
        if let Some(message) = self.messages.remove(&message_id) {
            if let Err(cleanup) = message.delete_file() {
                warn!("Large message {}: cleanup after abort failed: {}", message_id, cleanup);
            }
        }
        Err(e.into())
    }

    fn sync_file(&mut self, p: ReplicationSyncFile) -> DataplaneResult<()> {
        if p.file_kind != sync_file_kind::LARGE_MESSAGE {
            debug!(
                "Ignoring {} bytes of sync file {} (kind {})",
                p.data.len(),
                p.file_id,
                p.file_kind
            );
            return Ok(());
        }
        if self.ended.contains(&p.file_id) {
            debug!("Dropping sync data for ended large message {}", p.file_id);
            return Ok(());
        }
        let result = self.get_or_create(p.file_id)?.write_sync_chunk(&p.data);
        self.abort_on_error(p.file_id, result)
    }

    fn start_finish_sync(&mut self, p: ReplicationStartFinishSync) -> DataplaneResult<()> {
        if !p.finished {
            info!(
                "Initial sync from {} started ({} files)",
                p.node_id,
                p.file_ids.len()
            );
            return Ok(());
        }

        let mut ids: Vec<i64> = self.messages.keys().copied().collect();
        ids.sort_unstable();

        let mut first_error = None;
        for id in ids {
            let result = match self.messages.get(&id) {
                Some(message) => message.join_synced_data(&mut self.scratch),
                None => continue,
            };
            if let Err(e) = self.abort_on_error(id, result) {
                first_error.get_or_insert(e);
            }
        }
        info!("Initial sync from {} finished", p.node_id);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn end(&mut self, p: ReplicationLargeMessageEnd) -> DataplaneResult<()> {
        self.ended.insert(p.message_id);
        let Some(message) = self.messages.remove(&p.message_id) else {
            debug!("End for untracked large message {}", p.message_id);
            return Ok(());
        };

        if p.is_delete {
            message.delete_file()?;
        } else {
            message.set_pending_record_id(p.pending_record_id);
            message.release_resources();
        }
        Ok(())
    }

    /// Release the handles of everything still tracked
    pub fn stop(&mut self) {
        for (_, message) in self.messages.drain() {
            message.release_resources();
        }
        self.closed = true;
    }
}

impl Drop for ReplicationEndpoint {
    fn drop(&mut self) {
        if !self.messages.is_empty() {
            self.stop();
        }
    }
}
