//! In-memory ledger backend (tests and embedded use).

use crate::{LedgerState, LedgerStore, LedgerWrite, WriteBatch};
use anyhow::Result;
use fileledger_types::{AccessGrant, Address, EventRecord, FileId, FileRecord, VersionEntry};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryTables {
    files: HashMap<FileId, FileRecord>,
    hash_index: HashMap<String, FileId>,
    owner_index: HashMap<Address, Vec<FileId>>,
    grants: HashMap<(FileId, Address), AccessGrant>,
    grantees: HashMap<FileId, Vec<Address>>,
    versions: BTreeMap<(FileId, u64), VersionEntry>,
    events: BTreeMap<u64, EventRecord>,
    state: LedgerState,
}

impl MemoryTables {
    fn apply(&mut self, write: LedgerWrite) {
        match write {
            LedgerWrite::PutFile(record) => {
                self.files.insert(record.id, record);
            }
            LedgerWrite::IndexHash {
                content_hash,
                file_id,
            } => {
                self.hash_index.insert(content_hash, file_id);
            }
            LedgerWrite::PutOwnerFiles { owner, files } => {
                self.owner_index.insert(owner, files);
            }
            LedgerWrite::PutGrant {
                file_id,
                grantee,
                grant,
            } => {
                self.grants.insert((file_id, grantee), grant);
            }
            LedgerWrite::PutGrantees { file_id, grantees } => {
                self.grantees.insert(file_id, grantees);
            }
            LedgerWrite::AppendVersion {
                file_id,
                index,
                entry,
            } => {
                self.versions.insert((file_id, index), entry);
            }
            LedgerWrite::AppendEvent(record) => {
                self.events.insert(record.sequence, record);
            }
            LedgerWrite::PutState(state) => {
                self.state = state;
            }
        }
    }
}

/// Ledger store kept entirely in memory.
///
/// All tables sit behind one lock, so a committed batch becomes visible to
/// readers in a single step. Clones share tables and writer lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    inner: Arc<RwLock<MemoryTables>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn get_file(&self, id: FileId) -> Result<Option<FileRecord>> {
        Ok(self.inner.read().files.get(&id).cloned())
    }

    fn file_id_by_hash(&self, content_hash: &str) -> Result<Option<FileId>> {
        Ok(self.inner.read().hash_index.get(content_hash).copied())
    }

    fn files_by_owner(&self, owner: &Address) -> Result<Vec<FileId>> {
        Ok(self
            .inner
            .read()
            .owner_index
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    fn get_grant(&self, file_id: FileId, grantee: &Address) -> Result<Option<AccessGrant>> {
        Ok(self.inner.read().grants.get(&(file_id, *grantee)).copied())
    }

    fn grantees(&self, file_id: FileId) -> Result<Vec<Address>> {
        Ok(self
            .inner
            .read()
            .grantees
            .get(&file_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get_version(&self, file_id: FileId, index: u64) -> Result<Option<VersionEntry>> {
        Ok(self.inner.read().versions.get(&(file_id, index)).cloned())
    }

    fn versions(&self, file_id: FileId) -> Result<Vec<VersionEntry>> {
        Ok(self
            .inner
            .read()
            .versions
            .range((file_id, 0)..=(file_id, u64::MAX))
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    fn events(&self, from_sequence: u64, limit: usize) -> Result<Vec<EventRecord>> {
        Ok(self
            .inner
            .read()
            .events
            .range(from_sequence..)
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn ledger_state(&self) -> Result<LedgerState> {
        Ok(self.inner.read().state)
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut tables = self.inner.write();
        for write in batch.into_writes() {
            tables.apply(write);
        }
        Ok(())
    }

    fn write_lock(&self) -> &Mutex<()> {
        &self.writer
    }
}
