//! Per-message synchronisation state machine

use crate::error::{SyncError, SyncResult};
use crate::storage::{LargeMessageExtension, SequentialFile, StorageManager};
use parking_lot::Mutex;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Fresh,
    Buffering,
    Synced,
    Deleted,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Fresh => "fresh",
            SyncState::Buffering => "buffering",
            SyncState::Synced => "synced",
            SyncState::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

struct SyncInner {
    state: SyncState,
    main: Box<dyn SequentialFile>,
    side: Option<Box<dyn SequentialFile>>,
    pending_record_id: Option<i64>,
}

/// Closes the wrapped file when dropped, whichever way the scope is left
struct CloseOnDrop<'a> {
    message_id: i64,
    file: &'a mut Box<dyn SequentialFile>,
}

impl Deref for CloseOnDrop<'_> {
    type Target = Box<dyn SequentialFile>;

    fn deref(&self) -> &Self::Target {
        self.file
    }
}

impl DerefMut for CloseOnDrop<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.file
    }
}

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.file.close() {
            warn!(
                "Large message {}: failed to close {}: {}",
                self.message_id,
                self.file.file_name(),
                e
            );
        }
    }
}

/// Backup-side view of one large message under replication
///
/// All operations on an instance are serialised by one lock. Chunks must be
/// supplied in the order the primary sent them.
pub struct ReplicatedLargeMessage {
    message_id: i64,
    storage: Arc<dyn StorageManager>,
    inner: Mutex<SyncInner>,
}

impl ReplicatedLargeMessage {
    /// Fresh instance with an unopened body file
    pub fn new(message_id: i64, storage: Arc<dyn StorageManager>) -> SyncResult<Self> {
        let main = storage
            .create_large_message(message_id)
            .map_err(SyncError::io(message_id, "create body file"))?;
        debug!("Large message {}: created ({})", message_id, main.file_name());

        Ok(Self {
            message_id,
            storage,
            inner: Mutex::new(SyncInner {
                state: SyncState::Fresh,
                main,
                side: None,
                pending_record_id: None,
            }),
        })
    }

    pub fn message_id(&self) -> i64 {
        self.message_id
    }

    pub fn state(&self) -> SyncState {
        self.inner.lock().state
    }

    pub fn is_deleted(&self) -> bool {
        self.state() == SyncState::Deleted
    }

    pub fn pending_record_id(&self) -> Option<i64> {
        self.inner.lock().pending_record_id
    }

    pub fn set_pending_record_id(&self, record_id: i64) {
        self.inner.lock().pending_record_id = Some(record_id);
    }

    /// Append a live body chunk
    ///
    /// Before the initial sync has finished the chunk is parked in the side
    /// file; afterwards it goes straight into the body file.
    pub fn add_bytes(&self, chunk: &[u8]) -> SyncResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        match inner.state {
            SyncState::Deleted => Ok(()),
            SyncState::Synced => self
                .storage
                .add_bytes_to_large_message(inner.main.as_mut(), chunk)
                .map_err(SyncError::io(self.message_id, "append to body file")),
            SyncState::Fresh | SyncState::Buffering => {
                let side = match inner.side.take() {
                    Some(side) => side,
                    None => {
                        let file = self
                            .storage
                            .create_side_file(self.message_id, LargeMessageExtension::Sync)
                            .map_err(SyncError::io(self.message_id, "create side file"))?;
                        debug!(
                            "Large message {}: buffering into {}",
                            self.message_id,
                            file.file_name()
                        );
                        file
                    }
                };
                let side = inner.side.insert(side);
                if !side.is_open() {
                    side.open()
                        .map_err(SyncError::io(self.message_id, "open side file"))?;
                }
                side.write_internal(chunk)
                    .map_err(SyncError::io(self.message_id, "append to side file"))?;
                inner.state = SyncState::Buffering;
                Ok(())
            }
        }
    }

    /// Write initial-copy data from the primary straight into the body file
    pub fn write_sync_chunk(&self, data: &[u8]) -> SyncResult<()> {
        let mut inner = self.inner.lock();
        if inner.state == SyncState::Deleted {
            return Ok(());
        }
        self.storage
            .add_bytes_to_large_message(inner.main.as_mut(), data)
            .map_err(SyncError::io(self.message_id, "write sync chunk"))
    }

    /// Merge the side file (if any) into the body file and switch to `Synced`
    ///
    /// `scratch` is the copy buffer, reusable across messages. Once `Synced`
    /// further calls do nothing. If the copy fails part way the side file is
    /// closed, the state stays `Buffering` and the error is returned; the
    /// body may then hold a partial copy, so the caller should abort the
    /// message with [`delete_file`](Self::delete_file).
    pub fn join_synced_data(&self, scratch: &mut [u8]) -> SyncResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if matches!(inner.state, SyncState::Deleted | SyncState::Synced) {
            return Ok(());
        }
        if scratch.is_empty() {
            return Err(SyncError::EmptyScratchBuffer {
                message_id: self.message_id,
            });
        }

        if !inner.main.is_open() {
            inner
                .main
                .open()
                .map_err(SyncError::io(self.message_id, "open body file"))?;
        }

        if let Some(side) = inner.side.as_mut() {
            let copied = self.copy_side_file(side, inner.main.as_mut(), scratch)?;
            side.delete()
                .map_err(SyncError::io(self.message_id, "delete side file"))?;
            inner.side = None;
            debug!(
                "Large message {}: merged {} buffered bytes",
                self.message_id, copied
            );
        }

        inner.state = SyncState::Synced;
        info!("Large message {}: synced", self.message_id);
        Ok(())
    }

    fn copy_side_file(
        &self,
        side: &mut Box<dyn SequentialFile>,
        main: &mut dyn SequentialFile,
        scratch: &mut [u8],
    ) -> SyncResult<u64> {
        // Reopen so the read cursor starts at the first buffered byte
        side.close()
            .map_err(SyncError::io(self.message_id, "close side file"))?;
        side.open()
            .map_err(SyncError::io(self.message_id, "open side file"))?;
        let mut side = CloseOnDrop {
            message_id: self.message_id,
            file: side,
        };

        let mut copied = 0u64;
        loop {
            let n = side
                .read(scratch)
                .map_err(SyncError::io(self.message_id, "read side file"))?;
            if n == 0 {
                return Ok(copied);
            }
            self.storage
                .add_bytes_to_large_message(main, &scratch[..n])
                .map_err(SyncError::io(self.message_id, "merge into body file"))?;
            copied += n as u64;
        }
    }

    /// Remove the body file and any side file; the instance becomes `Deleted`
    ///
    /// The side file is cleaned up even when removing the body fails.
    /// Safe to call repeatedly. The first failure is returned.
    pub fn delete_file(&self) -> SyncResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let previous = inner.state;
        inner.state = SyncState::Deleted;

        let main_result = inner
            .main
            .delete()
            .map_err(SyncError::io(self.message_id, "delete body file"));

        let side_result = match inner.side.take() {
            Some(mut side) => {
                if let Err(e) = side.close() {
                    warn!(
                        "Large message {}: failed to close {} before delete: {}",
                        self.message_id,
                        side.file_name(),
                        e
                    );
                }
                side.delete()
                    .map_err(SyncError::io(self.message_id, "delete side file"))
            }
            None => Ok(()),
        };

        if previous != SyncState::Deleted {
            info!(
                "Large message {}: deleted (was {})",
                self.message_id, previous
            );
        }
        main_result.and(side_result)
    }

    /// Close open handles, keeping the content; failures are only logged
    pub fn release_resources(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if inner.main.is_open() {
            if let Err(e) = inner.main.close() {
                warn!(
                    "Large message {}: failed to close {}: {}",
                    self.message_id,
                    inner.main.file_name(),
                    e
                );
            }
        }
        if let Some(side) = inner.side.as_mut().filter(|s| s.is_open()) {
            if let Err(e) = side.close() {
                warn!(
                    "Large message {}: failed to close {}: {}",
                    self.message_id,
                    side.file_name(),
                    e
                );
            }
        }
        debug!("Large message {}: resources released", self.message_id);
    }
}

impl fmt::Debug for ReplicatedLargeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ReplicatedLargeMessage")
            .field("message_id", &self.message_id)
            .field("state", &inner.state)
            .field("main", &inner.main.file_name())
            .field("side", &inner.side.as_ref().map(|s| s.file_name().to_string()))
            .finish()
    }
}
