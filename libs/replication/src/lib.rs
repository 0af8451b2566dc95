//! # Replicated Large Message Synchronisation
//!
//! ## Purpose
//!
//! Keeps a backup node's large message files consistent with the primary.
//! While the backup is still copying the primary's files, live body chunks
//! are parked in a per-message side file; once the initial copy finishes,
//! the side file is merged into the body and later chunks go straight to it.
//!
//! ## State Machine
//!
//! ```text
//!            add_bytes                 join_synced_data
//!   Fresh ──────────────→ Buffering ─────────────────────→ Synced
//!     │                       │                              │
//!     └──────────── delete_file (any state) ─────────────────┴──→ Deleted
//! ```
//!
//! `Fresh` can also go straight to `Synced` when no chunk arrived before
//! the sync finished. `Deleted` is terminal and turns every later call into a
//! no-op.
//!
//! ## What This Crate Contains
//! - [`ReplicatedLargeMessage`]: the per-message state machine
//! - [`SequentialFile`] / [`StorageManager`]: storage collaborators
//! - [`FileStorageManager`]: `std::fs` implementation of both

pub mod error;
pub mod file;
pub mod storage;
pub mod sync;

pub use error::{SyncError, SyncResult};
pub use file::{FileSequentialFile, FileStorageManager};
pub use storage::{LargeMessageExtension, SequentialFile, StorageManager};
pub use sync::{ReplicatedLargeMessage, SyncState};
