//! Sled-backed ledger store.

use crate::{LedgerState, LedgerStore, LedgerWrite, StorageError, WriteBatch};
use anyhow::Result;
use fileledger_types::{
    AccessGrant, Address, EventRecord, FileId, FileRecord, VersionEntry, ADDRESS_BYTES,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use sled::transaction::{ConflictableTransactionResult, TransactionError, TransactionResult};
use sled::{Db, Transactional, Tree};
use std::path::Path;

const LEDGER_STATE_KEY: &[u8] = b"ledger_state";

#[derive(Debug, Clone, Copy)]
enum Table {
    Files,
    HashIndex,
    OwnerIndex,
    Grants,
    Grantees,
    Versions,
    Events,
    Metadata,
}

/// Ledger store persisted in a sled database, one tree per table.
///
/// Numeric key components are big-endian so that tree order matches
/// numeric order (version history and the event log rely on it).
pub struct SledLedgerStore {
    db: Db,
    files: Tree,
    hash_index: Tree,
    owner_index: Tree,
    grants: Tree,
    grantees: Tree,
    versions: Tree,
    events: Tree,
    metadata: Tree,
    writer: Mutex<()>,
}

impl SledLedgerStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let files = db.open_tree("files")?;
        let hash_index = db.open_tree("hash_index")?;
        let owner_index = db.open_tree("owner_index")?;
        let grants = db.open_tree("grants")?;
        let grantees = db.open_tree("grantees")?;
        let versions = db.open_tree("versions")?;
        let events = db.open_tree("events")?;
        let metadata = db.open_tree("metadata")?;

        let store = Self {
            db,
            files,
            hash_index,
            owner_index,
            grants,
            grantees,
            versions,
            events,
            metadata,
            writer: Mutex::new(()),
        };
        let state = store.ledger_state()?;
        tracing::info!(
            total_files = state.total_files,
            event_height = state.event_height,
            "Opened ledger database"
        );
        Ok(store)
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes).map_err(StorageError::from)?)
    }

    fn read<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> Result<Option<T>> {
        tree.get(key)?
            .map(|v| Self::decode::<T>(&v))
            .transpose()
    }

    fn encode(write: &LedgerWrite) -> Result<(Table, Vec<u8>, Vec<u8>)> {
        let encoded = match write {
            LedgerWrite::PutFile(record) => (
                Table::Files,
                record.id.to_be_bytes().to_vec(),
                serde_json::to_vec(record)?,
            ),
            LedgerWrite::IndexHash {
                content_hash,
                file_id,
            } => (
                Table::HashIndex,
                content_hash.as_bytes().to_vec(),
                file_id.to_be_bytes().to_vec(),
            ),
            LedgerWrite::PutOwnerFiles { owner, files } => (
                Table::OwnerIndex,
                owner.as_bytes().to_vec(),
                serde_json::to_vec(files)?,
            ),
            LedgerWrite::PutGrant {
                file_id,
                grantee,
                grant,
            } => (
                Table::Grants,
                grant_key(*file_id, grantee),
                serde_json::to_vec(grant)?,
            ),
            LedgerWrite::PutGrantees { file_id, grantees } => (
                Table::Grantees,
                file_id.to_be_bytes().to_vec(),
                serde_json::to_vec(grantees)?,
            ),
            LedgerWrite::AppendVersion {
                file_id,
                index,
                entry,
            } => (
                Table::Versions,
                version_key(*file_id, *index),
                serde_json::to_vec(entry)?,
            ),
            LedgerWrite::AppendEvent(record) => (
                Table::Events,
                record.sequence.to_be_bytes().to_vec(),
                serde_json::to_vec(record)?,
            ),
            LedgerWrite::PutState(state) => (
                Table::Metadata,
                LEDGER_STATE_KEY.to_vec(),
                serde_json::to_vec(state)?,
            ),
        };
        Ok(encoded)
    }
}

fn grant_key(file_id: FileId, grantee: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + ADDRESS_BYTES);
    key.extend_from_slice(&file_id.to_be_bytes());
    key.extend_from_slice(grantee.as_bytes());
    key
}

fn version_key(file_id: FileId, index: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&file_id.to_be_bytes());
    key.extend_from_slice(&index.to_be_bytes());
    key
}

fn file_id_from_value(tree: &'static str, bytes: &[u8]) -> Result<FileId> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::CorruptedKey {
            tree,
            expected: 8,
            actual: bytes.len(),
        })?;
    Ok(FileId::from_be_bytes(raw))
}

impl LedgerStore for SledLedgerStore {
    fn get_file(&self, id: FileId) -> Result<Option<FileRecord>> {
        Self::read(&self.files, &id.to_be_bytes())
    }

    fn file_id_by_hash(&self, content_hash: &str) -> Result<Option<FileId>> {
        self.hash_index
            .get(content_hash.as_bytes())?
            .map(|v| file_id_from_value("hash_index", &v))
            .transpose()
    }

    fn files_by_owner(&self, owner: &Address) -> Result<Vec<FileId>> {
        Ok(Self::read(&self.owner_index, owner.as_bytes())?.unwrap_or_default())
    }

    fn get_grant(&self, file_id: FileId, grantee: &Address) -> Result<Option<AccessGrant>> {
        Self::read(&self.grants, &grant_key(file_id, grantee))
    }

    fn grantees(&self, file_id: FileId) -> Result<Vec<Address>> {
        Ok(Self::read(&self.grantees, &file_id.to_be_bytes())?.unwrap_or_default())
    }

    fn get_version(&self, file_id: FileId, index: u64) -> Result<Option<VersionEntry>> {
        Self::read(&self.versions, &version_key(file_id, index))
    }

    fn versions(&self, file_id: FileId) -> Result<Vec<VersionEntry>> {
        self.versions
            .scan_prefix(file_id.to_be_bytes())
            .map(|item| {
                let (_, v) = item?;
                Self::decode(&v)
            })
            .collect()
    }

    fn events(&self, from_sequence: u64, limit: usize) -> Result<Vec<EventRecord>> {
        self.events
            .range(from_sequence.to_be_bytes()..)
            .take(limit)
            .map(|item| {
                let (_, v) = item?;
                Self::decode(&v)
            })
            .collect()
    }

    fn ledger_state(&self) -> Result<LedgerState> {
        Ok(Self::read(&self.metadata, LEDGER_STATE_KEY)?.unwrap_or_default())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        // Encode up front: the transaction closure may run more than once and
        // must not fail on anything but storage conflicts.
        let encoded = batch
            .iter()
            .map(Self::encode)
            .collect::<Result<Vec<_>>>()?;

        let result: TransactionResult<()> = (
            &self.files,
            &self.hash_index,
            &self.owner_index,
            &self.grants,
            &self.grantees,
            &self.versions,
            &self.events,
            &self.metadata,
        )
            .transaction(
                |(files, hash_index, owner_index, grants, grantees, versions, events, metadata)|
                 -> ConflictableTransactionResult<()> {
                    for (table, key, value) in &encoded {
                        let tree = match table {
                            Table::Files => files,
                            Table::HashIndex => hash_index,
                            Table::OwnerIndex => owner_index,
                            Table::Grants => grants,
                            Table::Grantees => grantees,
                            Table::Versions => versions,
                            Table::Events => events,
                            Table::Metadata => metadata,
                        };
                        tree.insert(key.as_slice(), value.as_slice())?;
                    }
                    Ok(())
                },
            );

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Storage(err)) => Err(StorageError::Database(err).into()),
            Err(TransactionError::Abort(())) => Err(StorageError::CommitAborted.into()),
        }
    }

    fn write_lock(&self) -> &Mutex<()> {
        &self.writer
    }
}
