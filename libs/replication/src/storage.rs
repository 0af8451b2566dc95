//! Storage collaborators used by the large message synchroniser
//!
//! [`SequentialFile`] is durable, appendable byte storage with its own read
//! cursor. [`StorageManager`] hands out the files for a large message and
//! appends bytes to them. The synchroniser only talks to these traits.

use std::fmt;
use std::io;

/// Appendable file with an independent read cursor
///
/// `read` starts at offset zero after every `open` and advances on its own;
/// `write_internal` always appends.
pub trait SequentialFile: Send + fmt::Debug {
    fn open(&mut self) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()>;

    fn is_open(&self) -> bool;

    /// Fill `buffer` from the read cursor; `Ok(0)` once exhausted
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize>;

    fn write_internal(&mut self, data: &[u8]) -> io::Result<()>;

    /// Close and remove the file; removing a missing file succeeds
    fn delete(&mut self) -> io::Result<()>;

    fn size(&self) -> io::Result<u64>;

    fn file_name(&self) -> &str;
}

/// Kind of file kept for a large message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LargeMessageExtension {
    /// The message body itself
    Durable,
    /// Body of a message that is not persisted
    Temporary,
    /// Side buffer collecting replicated bytes until the initial sync ends
    Sync,
}

impl LargeMessageExtension {
    pub fn suffix(self) -> &'static str {
        match self {
            LargeMessageExtension::Durable => "msg",
            LargeMessageExtension::Temporary => "tmp",
            LargeMessageExtension::Sync => "msg.sync",
        }
    }
}

pub trait StorageManager: Send + Sync {
    /// Fresh (unopened) handle on the body file of `message_id`
    fn create_large_message(&self, message_id: i64) -> io::Result<Box<dyn SequentialFile>>;

    /// Fresh (unopened) handle on a side file scoped to `message_id`
    fn create_side_file(
        &self,
        message_id: i64,
        extension: LargeMessageExtension,
    ) -> io::Result<Box<dyn SequentialFile>>;

    /// Append to a large message body, opening the file if needed
    fn add_bytes_to_large_message(
        &self,
        file: &mut dyn SequentialFile,
        bytes: &[u8],
    ) -> io::Result<()>;
}
