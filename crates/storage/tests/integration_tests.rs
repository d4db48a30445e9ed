//! Integration tests for ledger storage backends (Sled and in-memory).
//! Every backend runs the same suite: records, indices, grants, versions,
//! the event log and ledger counters.

use fileledger_storage::{
    LedgerState, LedgerStore, LedgerWrite, MemoryLedgerStore, SledLedgerStore, WriteBatch,
};
use fileledger_types::{
    AccessGrant, Address, EventRecord, FileId, FileRecord, LedgerEvent, VersionEntry,
};
use tempfile::TempDir;

/// Helper to create a test address
fn addr(byte: u8) -> Address {
    Address([byte; 20])
}

/// Helper to create a test file record
fn create_test_record(id: u64, owner: Address) -> FileRecord {
    FileRecord {
        id: FileId(id),
        content_hash: format!("QmHash{id}"),
        file_name: format!("doc-{id}.pdf"),
        file_size: 1_024 * id,
        metadata_cid: format!("bafyMeta{id}"),
        owner,
        created_at: 1_000 + id,
        updated_at: 1_000 + id,
        is_active: true,
        is_encrypted: false,
        master_key_hash: None,
        version_count: 1,
    }
}

/// Helper to build the batch an upload would commit
fn upload_batch(record: &FileRecord, owner_files: Vec<FileId>, sequence: u64) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch
        .push(LedgerWrite::PutFile(record.clone()))
        .push(LedgerWrite::IndexHash {
            content_hash: record.content_hash.clone(),
            file_id: record.id,
        })
        .push(LedgerWrite::PutOwnerFiles {
            owner: record.owner,
            files: owner_files,
        })
        .push(LedgerWrite::AppendVersion {
            file_id: record.id,
            index: 0,
            entry: VersionEntry::of(record, record.owner, record.created_at),
        })
        .push(LedgerWrite::AppendEvent(EventRecord {
            sequence,
            event: LedgerEvent::FileUploaded {
                file_id: record.id,
                content_hash: record.content_hash.clone(),
                file_name: record.file_name.clone(),
                owner: record.owner,
                metadata_cid: record.metadata_cid.clone(),
                timestamp: record.created_at,
            },
        }))
        .push(LedgerWrite::PutState(LedgerState {
            total_files: record.id.get(),
            event_height: sequence,
        }));
    batch
}

// ============================================================================
// Generic test suite that works with any LedgerStore implementation
// ============================================================================

fn test_file_records<S: LedgerStore>(storage: &S) {
    let owner = addr(1);
    let first = create_test_record(1, owner);
    let second = create_test_record(2, owner);

    storage
        .commit(upload_batch(&first, vec![first.id], 1))
        .unwrap();
    storage
        .commit(upload_batch(&second, vec![first.id, second.id], 2))
        .unwrap();

    assert_eq!(storage.get_file(FileId(1)).unwrap(), Some(first.clone()));
    assert_eq!(storage.get_file(FileId(2)).unwrap(), Some(second.clone()));
    assert!(storage.get_file(FileId(3)).unwrap().is_none());

    assert_eq!(
        storage.file_id_by_hash("QmHash2").unwrap(),
        Some(FileId(2))
    );
    assert!(storage.file_id_by_hash("QmMissing").unwrap().is_none());

    assert_eq!(
        storage.files_by_owner(&owner).unwrap(),
        vec![FileId(1), FileId(2)]
    );
    assert!(storage.files_by_owner(&addr(9)).unwrap().is_empty());

    let state = storage.ledger_state().unwrap();
    assert_eq!(state.total_files, 2);
    assert_eq!(state.event_height, 2);
}

fn test_grants<S: LedgerStore>(storage: &S) {
    let file_id = FileId(1);
    let reader = addr(2);
    let writer = addr(3);

    let mut batch = WriteBatch::new();
    batch
        .push(LedgerWrite::PutGrant {
            file_id,
            grantee: reader,
            grant: AccessGrant::default().with_read(10, 0),
        })
        .push(LedgerWrite::PutGrant {
            file_id,
            grantee: writer,
            grant: AccessGrant::default().with_write(11, 500),
        })
        .push(LedgerWrite::PutGrantees {
            file_id,
            grantees: vec![reader, writer],
        });
    storage.commit(batch).unwrap();

    let read_grant = storage.get_grant(file_id, &reader).unwrap().unwrap();
    assert!(read_grant.can_read);
    assert!(!read_grant.can_write);

    let write_grant = storage.get_grant(file_id, &writer).unwrap().unwrap();
    assert!(write_grant.can_write);
    assert_eq!(write_grant.expires_at, 500);

    assert!(storage.get_grant(FileId(2), &reader).unwrap().is_none());
    assert_eq!(storage.grantees(file_id).unwrap(), vec![reader, writer]);

    // Overwrite keeps the grantee list untouched
    let mut revoke = WriteBatch::new();
    revoke.push(LedgerWrite::PutGrant {
        file_id,
        grantee: reader,
        grant: read_grant.revoked(),
    });
    storage.commit(revoke).unwrap();
    let grant = storage.get_grant(file_id, &reader).unwrap().unwrap();
    assert!(!grant.can_read && !grant.can_write);
    assert_eq!(storage.grantees(file_id).unwrap().len(), 2);
}

fn test_version_history<S: LedgerStore>(storage: &S) {
    let owner = addr(4);
    let mut record = create_test_record(7, owner);

    let mut batch = WriteBatch::new();
    for index in 0..12u64 {
        record.content_hash = format!("QmV{index}");
        batch.push(LedgerWrite::AppendVersion {
            file_id: record.id,
            index,
            entry: VersionEntry::of(&record, owner, 100 + index),
        });
    }
    storage.commit(batch).unwrap();

    let history = storage.versions(FileId(7)).unwrap();
    assert_eq!(history.len(), 12);
    // Index 10 must sort after index 9
    assert_eq!(history[9].content_hash, "QmV9");
    assert_eq!(history[10].content_hash, "QmV10");
    assert_eq!(
        storage.get_version(FileId(7), 11).unwrap().unwrap().timestamp,
        111
    );
    assert!(storage.get_version(FileId(7), 12).unwrap().is_none());
    assert!(storage.versions(FileId(8)).unwrap().is_empty());
}

fn test_event_log<S: LedgerStore>(storage: &S) {
    let mut batch = WriteBatch::new();
    for sequence in 1..=5u64 {
        batch.push(LedgerWrite::AppendEvent(EventRecord {
            sequence,
            event: LedgerEvent::FileDeactivated {
                file_id: FileId(sequence),
                deactivated_by: addr(1),
                timestamp: sequence * 10,
            },
        }));
    }
    storage.commit(batch).unwrap();

    let all = storage.events(1, 100).unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all[0].sequence, 1);

    let tail = storage.events(4, 100).unwrap();
    assert_eq!(
        tail.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![4, 5]
    );

    let page = storage.events(2, 2).unwrap();
    assert_eq!(
        page.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![2, 3]
    );
}

fn test_empty_batch_is_noop<S: LedgerStore>(storage: &S) {
    let before = storage.ledger_state().unwrap();
    storage.commit(WriteBatch::new()).unwrap();
    assert_eq!(storage.ledger_state().unwrap(), before);
}

// ============================================================================
// Sled backend
// ============================================================================

#[test]
fn sled_file_records() {
    let dir = TempDir::new().unwrap();
    let storage = SledLedgerStore::new(dir.path()).unwrap();
    test_file_records(&storage);
}

#[test]
fn sled_grants() {
    let dir = TempDir::new().unwrap();
    let storage = SledLedgerStore::new(dir.path()).unwrap();
    test_grants(&storage);
}

#[test]
fn sled_version_history() {
    let dir = TempDir::new().unwrap();
    let storage = SledLedgerStore::new(dir.path()).unwrap();
    test_version_history(&storage);
}

#[test]
fn sled_event_log() {
    let dir = TempDir::new().unwrap();
    let storage = SledLedgerStore::new(dir.path()).unwrap();
    test_event_log(&storage);
}

#[test]
fn sled_empty_batch() {
    let dir = TempDir::new().unwrap();
    let storage = SledLedgerStore::new(dir.path()).unwrap();
    test_empty_batch_is_noop(&storage);
}

// ============================================================================
// Memory backend
// ============================================================================

#[test]
fn memory_file_records() {
    test_file_records(&MemoryLedgerStore::new());
}

#[test]
fn memory_grants() {
    test_grants(&MemoryLedgerStore::new());
}

#[test]
fn memory_version_history() {
    test_version_history(&MemoryLedgerStore::new());
}

#[test]
fn memory_event_log() {
    test_event_log(&MemoryLedgerStore::new());
}

#[test]
fn memory_empty_batch() {
    test_empty_batch_is_noop(&MemoryLedgerStore::new());
}
