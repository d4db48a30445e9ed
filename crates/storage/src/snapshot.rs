//! Snapshot export/import of a whole ledger.
//!
//! A snapshot directory holds `manifest.json` and `ledger.json`. Only primary
//! data is written; the hash index and owner index are rebuilt on import from
//! the version histories and the file records.

use crate::{LedgerState, LedgerStore, LedgerWrite, StorageError, WriteBatch};
use anyhow::Result;
use fileledger_types::{AccessGrant, Address, EventRecord, FileId, FileRecord, VersionEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const LEDGER_FILE: &str = "ledger.json";
const EVENT_PAGE: usize = 1_024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub format_version: u32,
    pub total_files: u64,
    pub total_versions: u64,
    pub total_grants: u64,
    pub event_height: u64,
    /// Unix seconds at export time.
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSnapshot {
    pub grantee: Address,
    pub grant: AccessGrant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub record: FileRecord,
    pub versions: Vec<VersionEntry>,
    /// In first-grant order, which is the order of the grantee index.
    pub grants: Vec<GrantSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub files: Vec<FileSnapshot>,
    pub events: Vec<EventRecord>,
}

/// Read the entire ledger out of `store`.
pub fn collect_snapshot<S: LedgerStore + ?Sized>(store: &S) -> Result<LedgerSnapshot> {
    let state = store.ledger_state()?;

    let mut files = Vec::with_capacity(state.total_files as usize);
    for raw_id in 1..=state.total_files {
        let id = FileId(raw_id);
        let record = store.get_file(id)?.ok_or_else(|| {
            StorageError::InvalidSnapshot(format!("file {id} missing below total_files"))
        })?;
        let versions = store.versions(id)?;
        let mut grants = Vec::new();
        for grantee in store.grantees(id)? {
            if let Some(grant) = store.get_grant(id, &grantee)? {
                grants.push(GrantSnapshot { grantee, grant });
            }
        }
        files.push(FileSnapshot {
            record,
            versions,
            grants,
        });
    }

    let mut events = Vec::new();
    let mut next = 1;
    loop {
        let page = store.events(next, EVENT_PAGE)?;
        let Some(last) = page.last() else {
            break;
        };
        next = last.sequence + 1;
        events.extend(page);
    }

    Ok(LedgerSnapshot { files, events })
}

/// Write a snapshot of `store` into `dir` (created if missing).
pub fn export_snapshot<S: LedgerStore + ?Sized>(store: &S, dir: &Path) -> Result<SnapshotManifest> {
    let snapshot = collect_snapshot(store)?;
    let state = store.ledger_state()?;

    let manifest = SnapshotManifest {
        format_version: SNAPSHOT_FORMAT_VERSION,
        total_files: snapshot.files.len() as u64,
        total_versions: snapshot
            .files
            .iter()
            .map(|f| f.versions.len() as u64)
            .sum(),
        total_grants: snapshot.files.iter().map(|f| f.grants.len() as u64).sum(),
        event_height: state.event_height,
        created_at: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
    };

    fs::create_dir_all(dir).map_err(StorageError::from)?;
    fs::write(dir.join(LEDGER_FILE), serde_json::to_vec(&snapshot)?)
        .map_err(StorageError::from)?;
    fs::write(
        dir.join(MANIFEST_FILE),
        serde_json::to_vec_pretty(&manifest)?,
    )
    .map_err(StorageError::from)?;

    tracing::info!(
        dir = %dir.display(),
        files = manifest.total_files,
        events = manifest.event_height,
        "Exported ledger snapshot"
    );
    Ok(manifest)
}

/// Restore the snapshot in `dir` into an empty `store`, in one atomic batch.
pub fn import_snapshot<S: LedgerStore + ?Sized>(store: &S, dir: &Path) -> Result<SnapshotManifest> {
    let _guard = store.write_lock().lock();
    let current = store.ledger_state()?;
    if current.total_files != 0 || current.event_height != 0 {
        return Err(StorageError::NotEmpty {
            total_files: current.total_files,
            event_height: current.event_height,
        }
        .into());
    }

    let manifest: SnapshotManifest =
        serde_json::from_slice(&fs::read(dir.join(MANIFEST_FILE)).map_err(StorageError::from)?)?;
    if manifest.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(StorageError::InvalidSnapshot(format!(
            "unsupported format version {}",
            manifest.format_version
        ))
        .into());
    }
    let snapshot: LedgerSnapshot =
        serde_json::from_slice(&fs::read(dir.join(LEDGER_FILE)).map_err(StorageError::from)?)?;

    let batch = restore_batch(&manifest, snapshot)?;
    store.commit(batch)?;

    tracing::info!(
        dir = %dir.display(),
        files = manifest.total_files,
        events = manifest.event_height,
        "Imported ledger snapshot"
    );
    Ok(manifest)
}

fn restore_batch(manifest: &SnapshotManifest, snapshot: LedgerSnapshot) -> Result<WriteBatch> {
    if snapshot.files.len() as u64 != manifest.total_files {
        return Err(StorageError::InvalidSnapshot(format!(
            "manifest lists {} files, ledger has {}",
            manifest.total_files,
            snapshot.files.len()
        ))
        .into());
    }

    let mut batch = WriteBatch::new();
    let mut hash_index: HashMap<String, FileId> = HashMap::new();
    let mut owner_index: HashMap<Address, Vec<FileId>> = HashMap::new();

    for (position, file) in snapshot.files.into_iter().enumerate() {
        let expected = FileId(position as u64 + 1);
        let id = file.record.id;
        if id != expected {
            return Err(StorageError::InvalidSnapshot(format!(
                "file ids must be dense, expected {expected} got {id}"
            ))
            .into());
        }
        if file.versions.len() as u64 != file.record.version_count {
            return Err(StorageError::InvalidSnapshot(format!(
                "file {id} has {} versions but version_count {}",
                file.versions.len(),
                file.record.version_count
            ))
            .into());
        }
        let live = file.versions.last().is_some_and(|last| {
            last.content_hash == file.record.content_hash
                && last.file_size == file.record.file_size
                && last.metadata_cid == file.record.metadata_cid
        });
        if !live {
            return Err(StorageError::InvalidSnapshot(format!(
                "file {id} content does not match its latest version"
            ))
            .into());
        }

        for (index, entry) in file.versions.into_iter().enumerate() {
            match hash_index.get(&entry.content_hash) {
                Some(owner_id) if *owner_id != id => {
                    return Err(StorageError::InvalidSnapshot(format!(
                        "content hash {} claimed by files {owner_id} and {id}",
                        entry.content_hash
                    ))
                    .into());
                }
                Some(_) => {}
                None => {
                    hash_index.insert(entry.content_hash.clone(), id);
                    batch.push(LedgerWrite::IndexHash {
                        content_hash: entry.content_hash.clone(),
                        file_id: id,
                    });
                }
            }
            batch.push(LedgerWrite::AppendVersion {
                file_id: id,
                index: index as u64,
                entry,
            });
        }

        if !file.grants.is_empty() {
            let grantees: Vec<Address> = file.grants.iter().map(|g| g.grantee).collect();
            for GrantSnapshot { grantee, grant } in file.grants {
                batch.push(LedgerWrite::PutGrant {
                    file_id: id,
                    grantee,
                    grant,
                });
            }
            batch.push(LedgerWrite::PutGrantees {
                file_id: id,
                grantees,
            });
        }

        owner_index.entry(file.record.owner).or_default().push(id);
        batch.push(LedgerWrite::PutFile(file.record));
    }

    for (owner, files) in owner_index {
        batch.push(LedgerWrite::PutOwnerFiles { owner, files });
    }

    let event_height = snapshot.events.last().map(|e| e.sequence).unwrap_or(0);
    if event_height != manifest.event_height {
        return Err(StorageError::InvalidSnapshot(format!(
            "manifest event height {} does not match log height {event_height}",
            manifest.event_height
        ))
        .into());
    }
    for record in snapshot.events {
        batch.push(LedgerWrite::AppendEvent(record));
    }

    batch.push(LedgerWrite::PutState(LedgerState {
        total_files: manifest.total_files,
        event_height,
    }));
    Ok(batch)
}
