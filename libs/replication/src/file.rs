//! `std::fs` backed storage
//!
//! Layout under the storage directory:
//!
//! ```text
//! <id>.msg        large message body
//! <id>.msg.sync   side buffer while the initial sync is running
//! <id>.tmp        non-persistent body
//! ```

use crate::storage::{LargeMessageExtension, SequentialFile, StorageManager};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct FileSequentialFile {
    path: PathBuf,
    name: String,
    file: Option<File>,
    read_position: u64,
}

impl FileSequentialFile {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            file: None,
            read_position: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn handle(&mut self) -> io::Result<&mut File> {
        let name = &self.name;
        self.file.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, format!("{} is not open", name))
        })
    }
}

impl SequentialFile for FileSequentialFile {
    fn open(&mut self) -> io::Result<()> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(&self.path)?;
            self.file = Some(file);
            self.read_position = 0;
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_data()?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let position = self.read_position;
        let file = self.handle()?;
        file.seek(SeekFrom::Start(position))?;
        let n = file.read(buffer)?;
        self.read_position += n as u64;
        Ok(n)
    }

    fn write_internal(&mut self, data: &[u8]) -> io::Result<()> {
        self.handle()?.write_all(data)
    }

    fn delete(&mut self) -> io::Result<()> {
        // A handle that fails to flush is still dropped; the file goes anyway
        let closed = self.close();
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Deleted {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        closed
    }

    fn size(&self) -> io::Result<u64> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn file_name(&self) -> &str {
        &self.name
    }
}

/// Large message files in one directory
#[derive(Debug, Clone)]
pub struct FileStorageManager {
    directory: PathBuf,
}

impl FileStorageManager {
    /// Use `directory`, creating it if missing
    pub fn new(directory: impl Into<PathBuf>) -> io::Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, message_id: i64, extension: LargeMessageExtension) -> PathBuf {
        self.directory
            .join(format!("{}.{}", message_id, extension.suffix()))
    }
}

impl StorageManager for FileStorageManager {
    fn create_large_message(&self, message_id: i64) -> io::Result<Box<dyn SequentialFile>> {
        self.create_side_file(message_id, LargeMessageExtension::Durable)
    }

    fn create_side_file(
        &self,
        message_id: i64,
        extension: LargeMessageExtension,
    ) -> io::Result<Box<dyn SequentialFile>> {
        Ok(Box::new(FileSequentialFile::new(
            self.path_for(message_id, extension),
        )))
    }

    fn add_bytes_to_large_message(
        &self,
        file: &mut dyn SequentialFile,
        bytes: &[u8],
    ) -> io::Result<()> {
        if !file.is_open() {
            file.open()?;
        }
        file.write_internal(bytes)
    }
}
