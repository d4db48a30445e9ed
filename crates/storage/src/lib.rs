//! Persistence for the file ledger.
//!
//! A [`LedgerStore`] exposes typed point reads over ledger tables and a single
//! mutation entry point, [`LedgerStore::commit`], which applies a whole
//! [`WriteBatch`] atomically. Readers observe either the state before a batch
//! or the state after it, never a mix.

use anyhow::Result;
use fileledger_types::{AccessGrant, Address, EventRecord, FileId, FileRecord, VersionEntry};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

mod memory;
mod sled_store;
pub mod snapshot;

pub use memory::MemoryLedgerStore;
pub use sled_store::SledLedgerStore;
pub use snapshot::{
    collect_snapshot, export_snapshot, import_snapshot, FileSnapshot, GrantSnapshot, LedgerSnapshot,
    SnapshotManifest, SNAPSHOT_FORMAT_VERSION,
};

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupted key in tree {tree}: expected {expected} bytes, got {actual}")]
    CorruptedKey {
        tree: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Batch commit aborted")]
    CommitAborted,
    #[error("Target store is not empty ({total_files} files, {event_height} events)")]
    NotEmpty { total_files: u64, event_height: u64 },
    #[error("Snapshot is inconsistent: {0}")]
    InvalidSnapshot(String),
}

/// Ledger-wide counters, persisted with every batch that changes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Number of files ever registered. Also the highest allocated id.
    pub total_files: u64,
    /// Sequence number of the latest event (0 = no events yet).
    pub event_height: u64,
}

impl LedgerState {
    /// Id the next upload will receive.
    pub fn next_file_id(&self) -> FileId {
        FileId(self.total_files).next()
    }

    pub fn next_event_sequence(&self) -> u64 {
        self.event_height.saturating_add(1)
    }
}

/// One write inside a [`WriteBatch`].
///
/// Index writes carry the full new value of the index entry; the ledger
/// computes them while holding [`LedgerStore::write_lock`].
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerWrite {
    PutFile(FileRecord),
    IndexHash {
        content_hash: String,
        file_id: FileId,
    },
    PutOwnerFiles {
        owner: Address,
        files: Vec<FileId>,
    },
    PutGrant {
        file_id: FileId,
        grantee: Address,
        grant: AccessGrant,
    },
    PutGrantees {
        file_id: FileId,
        grantees: Vec<Address>,
    },
    AppendVersion {
        file_id: FileId,
        index: u64,
        entry: VersionEntry,
    },
    AppendEvent(EventRecord),
    PutState(LedgerState),
}

/// Ordered set of writes that must be applied all together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<LedgerWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: LedgerWrite) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerWrite> {
        self.writes.iter()
    }

    pub fn into_writes(self) -> Vec<LedgerWrite> {
        self.writes
    }
}

/// Abstract ledger storage
pub trait LedgerStore: Send + Sync {
    fn get_file(&self, id: FileId) -> Result<Option<FileRecord>>;
    fn file_id_by_hash(&self, content_hash: &str) -> Result<Option<FileId>>;
    /// Files created by `owner`, in creation order.
    fn files_by_owner(&self, owner: &Address) -> Result<Vec<FileId>>;
    fn get_grant(&self, file_id: FileId, grantee: &Address) -> Result<Option<AccessGrant>>;
    /// Every address ever granted access to the file, in first-grant order.
    fn grantees(&self, file_id: FileId) -> Result<Vec<Address>>;
    fn get_version(&self, file_id: FileId, index: u64) -> Result<Option<VersionEntry>>;
    /// Full version history, oldest first.
    fn versions(&self, file_id: FileId) -> Result<Vec<VersionEntry>>;
    /// Up to `limit` events with `sequence >= from_sequence`, oldest first.
    fn events(&self, from_sequence: u64, limit: usize) -> Result<Vec<EventRecord>>;
    fn ledger_state(&self) -> Result<LedgerState>;

    /// Apply every write of `batch` atomically.
    fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Lock held from the first read of a mutation until its commit.
    ///
    /// Every handle onto the same underlying tables (clones, `Arc`s) returns
    /// the same lock, so checks such as hash uniqueness cannot interleave
    /// between two ledgers sharing a store.
    fn write_lock(&self) -> &Mutex<()>;
}

impl<S: LedgerStore + ?Sized> LedgerStore for std::sync::Arc<S> {
    fn get_file(&self, id: FileId) -> Result<Option<FileRecord>> {
        (**self).get_file(id)
    }

    fn file_id_by_hash(&self, content_hash: &str) -> Result<Option<FileId>> {
        (**self).file_id_by_hash(content_hash)
    }

    fn files_by_owner(&self, owner: &Address) -> Result<Vec<FileId>> {
        (**self).files_by_owner(owner)
    }

    fn get_grant(&self, file_id: FileId, grantee: &Address) -> Result<Option<AccessGrant>> {
        (**self).get_grant(file_id, grantee)
    }

    fn grantees(&self, file_id: FileId) -> Result<Vec<Address>> {
        (**self).grantees(file_id)
    }

    fn get_version(&self, file_id: FileId, index: u64) -> Result<Option<VersionEntry>> {
        (**self).get_version(file_id, index)
    }

    fn versions(&self, file_id: FileId) -> Result<Vec<VersionEntry>> {
        (**self).versions(file_id)
    }

    fn events(&self, from_sequence: u64, limit: usize) -> Result<Vec<EventRecord>> {
        (**self).events(from_sequence, limit)
    }

    fn ledger_state(&self) -> Result<LedgerState> {
        (**self).ledger_state()
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        (**self).commit(batch)
    }

    fn write_lock(&self) -> &Mutex<()> {
        (**self).write_lock()
    }
}
