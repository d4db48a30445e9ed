//! The access-controlled file ledger.
//!
//! Every mutating call follows the same shape: take the store's writer lock, check
//! every constraint against the committed state, stage all writes and events
//! into one [`WriteBatch`], commit it, then hand the events to the sinks.
//! A call that fails any check returns before anything is staged.

use crate::clock::{Clock, SystemClock};
use crate::errors::{LedgerError, Result};
use crate::events::EventSink;
use fileledger_storage::{LedgerState, LedgerStore, LedgerWrite, WriteBatch};
use fileledger_types::{
    AccessGrant, AccessInfo, Address, CallerContext, EventRecord, FileId, FileRecord, FileUpdate,
    LedgerEvent, NewFile, VersionEntry,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default upper bound for caller-supplied string fields, in bytes.
pub const DEFAULT_MAX_FIELD_LEN: usize = 512;

/// Tunables of the ledger library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Longest accepted content hash, file name, metadata CID or key hash.
    pub max_field_len: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Permission {
    Read,
    Write,
}

/// Writes and events of one operation, waiting to be committed together.
struct Staged {
    batch: WriteBatch,
    state: LedgerState,
    events: Vec<EventRecord>,
}

impl Staged {
    fn new(state: LedgerState) -> Self {
        Self {
            batch: WriteBatch::new(),
            state,
            events: Vec::new(),
        }
    }

    fn write(&mut self, write: LedgerWrite) -> &mut Self {
        self.batch.push(write);
        self
    }

    fn emit(&mut self, event: LedgerEvent) {
        self.state.event_height = self.state.next_event_sequence();
        let record = EventRecord {
            sequence: self.state.event_height,
            event,
        };
        self.batch.push(LedgerWrite::AppendEvent(record.clone()));
        self.events.push(record);
    }
}

/// Versioned file registry with per-address read/write grants.
///
/// Mutations are serialized behind [`LedgerStore::write_lock`], so several
/// ledgers over one store still commit one at a time. Queries read the store
/// directly and see either the state before or after any commit.
pub struct FileLedger<S: LedgerStore> {
    store: S,
    clock: Arc<dyn Clock>,
    sinks: Vec<Arc<dyn EventSink>>,
    config: LedgerConfig,
}

impl<S: LedgerStore> FileLedger<S> {
    /// Ledger over `store` using the wall clock and default limits.
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            sinks: Vec::new(),
            config: LedgerConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a sink that receives every committed event.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Register a new file owned by the caller and return its id.
    ///
    /// The zero address cannot own files.
    pub fn upload(&self, ctx: &CallerContext, file: NewFile) -> Result<FileId> {
        self.check_field("content_hash", &file.content_hash)?;
        self.check_field("file_name", &file.file_name)?;
        if file.file_size == 0 {
            return Err(LedgerError::InvalidSize);
        }
        self.check_field("metadata_cid", &file.metadata_cid)?;
        match &file.master_key_hash {
            Some(key_hash) => self.check_field("master_key_hash", key_hash)?,
            None if file.is_encrypted => {
                return Err(LedgerError::EmptyField {
                    field: "master_key_hash",
                })
            }
            None => {}
        }
        let owner = ctx.caller();
        if owner.is_zero() {
            return Err(LedgerError::InvalidCaller { caller: owner });
        }

        let _guard = self.store.write_lock().lock();
        if let Some(existing) = self.store.file_id_by_hash(&file.content_hash)? {
            return Err(LedgerError::DuplicateHash {
                content_hash: file.content_hash,
                existing,
            });
        }

        let now = self.clock.now_secs();
        let state = self.store.ledger_state()?;
        let file_id = state.next_file_id();

        let record = FileRecord {
            id: file_id,
            content_hash: file.content_hash,
            file_name: file.file_name,
            file_size: file.file_size,
            metadata_cid: file.metadata_cid,
            owner,
            created_at: now,
            updated_at: now,
            is_active: true,
            is_encrypted: file.is_encrypted,
            master_key_hash: file.master_key_hash,
            version_count: 1,
        };

        let mut owner_files = self.store.files_by_owner(&owner)?;
        owner_files.push(file_id);

        let mut staged = Staged::new(state);
        staged.state.total_files = file_id.get();
        staged
            .write(LedgerWrite::IndexHash {
                content_hash: record.content_hash.clone(),
                file_id,
            })
            .write(LedgerWrite::PutOwnerFiles {
                owner,
                files: owner_files,
            })
            .write(LedgerWrite::AppendVersion {
                file_id,
                index: 0,
                entry: VersionEntry::of(&record, owner, now),
            });
        staged.emit(LedgerEvent::FileUploaded {
            file_id,
            content_hash: record.content_hash.clone(),
            file_name: record.file_name.clone(),
            owner,
            metadata_cid: record.metadata_cid.clone(),
            timestamp: now,
        });
        staged.write(LedgerWrite::PutFile(record));
        self.commit(staged)?;

        info!(%file_id, %owner, "File uploaded");
        Ok(file_id)
    }

    /// Replace the live content of a file and append a version entry.
    ///
    /// The caller must be the owner or hold an unexpired write grant. The new
    /// content hash may repeat one of this file's own earlier hashes but must
    /// not belong to any other file.
    pub fn update_file(&self, ctx: &CallerContext, file_id: FileId, update: FileUpdate) -> Result<()> {
        let _guard = self.store.write_lock().lock();
        let mut record = self.load_active(file_id)?;
        let caller = ctx.caller();
        let now = self.clock.now_secs();
        if !self.permits(&record, &caller, Permission::Write, now)? {
            return Err(self.unauthorized(caller, file_id, "update"));
        }

        self.check_field("content_hash", &update.content_hash)?;
        if update.file_size == 0 {
            return Err(LedgerError::InvalidSize);
        }
        self.check_field("metadata_cid", &update.metadata_cid)?;

        let indexed = self.store.file_id_by_hash(&update.content_hash)?;
        match indexed {
            Some(existing) if existing != file_id => {
                return Err(LedgerError::DuplicateHash {
                    content_hash: update.content_hash,
                    existing,
                })
            }
            _ => {}
        }

        let mut staged = Staged::new(self.store.ledger_state()?);
        if indexed.is_none() {
            staged.write(LedgerWrite::IndexHash {
                content_hash: update.content_hash.clone(),
                file_id,
            });
        }

        let old_content_hash = std::mem::replace(&mut record.content_hash, update.content_hash);
        let old_metadata_cid = std::mem::replace(&mut record.metadata_cid, update.metadata_cid);
        record.file_size = update.file_size;
        record.updated_at = now;
        let index = record.next_version_index();
        record.version_count += 1;

        staged.write(LedgerWrite::AppendVersion {
            file_id,
            index,
            entry: VersionEntry::of(&record, caller, now),
        });
        staged.emit(LedgerEvent::FileUpdated {
            file_id,
            old_content_hash,
            new_content_hash: record.content_hash.clone(),
            old_metadata_cid,
            new_metadata_cid: record.metadata_cid.clone(),
            version: record.version_count,
            updated_by: caller,
            timestamp: now,
        });
        let version = record.version_count;
        staged.write(LedgerWrite::PutFile(record));
        self.commit(staged)?;

        info!(%file_id, %caller, version, "File updated");
        Ok(())
    }

    /// Restore the content of history entry `version_index` (0-based) by
    /// appending a copy of it as the newest version. Owner only.
    pub fn rollback_file(&self, ctx: &CallerContext, file_id: FileId, version_index: u64) -> Result<()> {
        let _guard = self.store.write_lock().lock();
        let mut record = self.load_active(file_id)?;
        let caller = ctx.caller();
        if !record.is_owner(&caller) {
            return Err(self.unauthorized(caller, file_id, "roll back"));
        }

        let source = if version_index < record.version_count {
            self.store.get_version(file_id, version_index)?
        } else {
            None
        };
        let source = source.ok_or(LedgerError::VersionNotFound {
            file_id,
            index: version_index,
        })?;

        let now = self.clock.now_secs();
        record.content_hash = source.content_hash;
        record.file_size = source.file_size;
        record.metadata_cid = source.metadata_cid;
        record.updated_at = now;
        let index = record.next_version_index();
        record.version_count += 1;

        let mut entry = VersionEntry::of(&record, caller, now);
        entry.restored_from = Some(version_index);

        let mut staged = Staged::new(self.store.ledger_state()?);
        staged.write(LedgerWrite::AppendVersion {
            file_id,
            index,
            entry,
        });
        staged.emit(LedgerEvent::FileRolledBack {
            file_id,
            version_index,
            content_hash: record.content_hash.clone(),
            metadata_cid: record.metadata_cid.clone(),
            version: record.version_count,
            rolled_back_by: caller,
            timestamp: now,
        });
        staged.write(LedgerWrite::PutFile(record));
        self.commit(staged)?;

        info!(%file_id, %caller, version_index, "File rolled back");
        Ok(())
    }

    /// Permanently deactivate a file. Owner only; there is no way back.
    pub fn deactivate_file(&self, ctx: &CallerContext, file_id: FileId) -> Result<()> {
        let _guard = self.store.write_lock().lock();
        let mut record = self.load_active(file_id)?;
        let caller = ctx.caller();
        if !record.is_owner(&caller) {
            return Err(self.unauthorized(caller, file_id, "deactivate"));
        }

        let now = self.clock.now_secs();
        record.is_active = false;

        let mut staged = Staged::new(self.store.ledger_state()?);
        staged.write(LedgerWrite::PutFile(record));
        staged.emit(LedgerEvent::FileDeactivated {
            file_id,
            deactivated_by: caller,
            timestamp: now,
        });
        self.commit(staged)?;

        info!(%file_id, %caller, "File deactivated");
        Ok(())
    }

    /// Allow `grantee` to read the file until `expires_at` (0 = no expiry).
    pub fn grant_read(
        &self,
        ctx: &CallerContext,
        file_id: FileId,
        grantee: Address,
        expires_at: u64,
    ) -> Result<()> {
        self.grant(ctx, file_id, grantee, expires_at, true, false)
    }

    /// Allow `grantee` to update the file until `expires_at` (0 = no expiry).
    pub fn grant_write(
        &self,
        ctx: &CallerContext,
        file_id: FileId,
        grantee: Address,
        expires_at: u64,
    ) -> Result<()> {
        self.grant(ctx, file_id, grantee, expires_at, false, true)
    }

    /// Allow `grantee` to read and update the file in one step: a single
    /// commit and a single `AccessGranted` event carrying both flags.
    pub fn grant_read_write(
        &self,
        ctx: &CallerContext,
        file_id: FileId,
        grantee: Address,
        expires_at: u64,
    ) -> Result<()> {
        self.grant(ctx, file_id, grantee, expires_at, true, true)
    }

    fn grant(
        &self,
        ctx: &CallerContext,
        file_id: FileId,
        grantee: Address,
        expires_at: u64,
        read: bool,
        write: bool,
    ) -> Result<()> {
        let _guard = self.store.write_lock().lock();
        let record = self.load_active(file_id)?;
        let caller = ctx.caller();
        if !record.is_owner(&caller) {
            return Err(self.unauthorized(caller, file_id, "grant access to"));
        }
        if grantee.is_zero() || record.is_owner(&grantee) {
            return Err(LedgerError::InvalidGrantee { grantee });
        }

        let now = self.clock.now_secs();
        let current = self
            .store
            .get_grant(file_id, &grantee)?
            .unwrap_or_default();
        let mut grant = current;
        if read {
            grant = grant.with_read(now, expires_at);
        }
        if write {
            grant = grant.with_write(now, expires_at);
        }

        let mut staged = Staged::new(self.store.ledger_state()?);
        let mut grantees = self.store.grantees(file_id)?;
        if !grantees.contains(&grantee) {
            grantees.push(grantee);
            staged.write(LedgerWrite::PutGrantees { file_id, grantees });
        }
        staged.write(LedgerWrite::PutGrant {
            file_id,
            grantee,
            grant,
        });
        staged.emit(LedgerEvent::AccessGranted {
            file_id,
            grantee,
            can_read: grant.can_read,
            can_write: grant.can_write,
            expires_at,
            granted_by: caller,
            timestamp: now,
        });
        self.commit(staged)?;

        info!(%file_id, %grantee, read, write, expires_at, "Access granted");
        Ok(())
    }

    /// Clear both flags of `grantee`'s grant. The address stays listed in
    /// [`users_with_access`](Self::users_with_access).
    pub fn revoke_access(&self, ctx: &CallerContext, file_id: FileId, grantee: Address) -> Result<()> {
        let _guard = self.store.write_lock().lock();
        let record = self.load_active(file_id)?;
        let caller = ctx.caller();
        if !record.is_owner(&caller) {
            return Err(self.unauthorized(caller, file_id, "revoke access to"));
        }

        let Some(current) = self.store.get_grant(file_id, &grantee)? else {
            debug!(%file_id, %grantee, "Revoke without grant, nothing to do");
            return Ok(());
        };

        let now = self.clock.now_secs();
        let mut staged = Staged::new(self.store.ledger_state()?);
        staged.write(LedgerWrite::PutGrant {
            file_id,
            grantee,
            grant: current.revoked(),
        });
        staged.emit(LedgerEvent::AccessRevoked {
            file_id,
            revokee: grantee,
            revoked_by: caller,
            timestamp: now,
        });
        self.commit(staged)?;

        info!(%file_id, %grantee, "Access revoked");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn file_info(&self, file_id: FileId) -> Result<FileRecord> {
        self.load_active(file_id)
    }

    /// Whether `address` may read the file right now.
    ///
    /// Always false for unknown or inactive files, owner included.
    pub fn has_read_access(&self, file_id: FileId, address: &Address) -> Result<bool> {
        self.check_access(file_id, address, Permission::Read)
    }

    /// Whether `address` may update the file right now.
    pub fn has_write_access(&self, file_id: FileId, address: &Address) -> Result<bool> {
        self.check_access(file_id, address, Permission::Write)
    }

    /// Raw grant of `address` plus the derived expiry flag.
    ///
    /// The owner has no stored grant, so this reports all flags cleared for
    /// the owner. Use the access checks for authorization.
    pub fn access_info(&self, file_id: FileId, address: &Address) -> Result<AccessInfo> {
        self.load_active(file_id)?;
        let grant = self.store.get_grant(file_id, address)?.unwrap_or_default();
        Ok(grant.info(self.clock.now_secs()))
    }

    /// Files created by `owner`, in creation order, deactivated ones included.
    pub fn user_files(&self, owner: &Address) -> Result<Vec<FileId>> {
        Ok(self.store.files_by_owner(owner)?)
    }

    pub fn total_files(&self) -> Result<u64> {
        Ok(self.store.ledger_state()?.total_files)
    }

    /// File a content hash was ever registered to, if any.
    pub fn file_id_by_hash(&self, content_hash: &str) -> Result<Option<FileId>> {
        Ok(self.store.file_id_by_hash(content_hash)?)
    }

    /// Version history, oldest first. Its length equals `version_count`.
    pub fn file_versions(&self, file_id: FileId) -> Result<Vec<VersionEntry>> {
        self.load_active(file_id)?;
        Ok(self.store.versions(file_id)?)
    }

    /// Every address ever granted access, in first-grant order, including
    /// revoked and expired grantees.
    pub fn users_with_access(&self, file_id: FileId) -> Result<Vec<Address>> {
        self.load_active(file_id)?;
        Ok(self.store.grantees(file_id)?)
    }

    /// Grantees that can read the file right now.
    pub fn active_grantees(&self, file_id: FileId) -> Result<Vec<Address>> {
        self.load_active(file_id)?;
        let now = self.clock.now_secs();
        let mut active = Vec::new();
        for grantee in self.store.grantees(file_id)? {
            let grant = self.store.get_grant(file_id, &grantee)?;
            if grant.is_some_and(|g| g.allows_read(now)) {
                active.push(grantee);
            }
        }
        Ok(active)
    }

    /// Up to `limit` committed events with `sequence >= from_sequence`.
    pub fn events_since(&self, from_sequence: u64, limit: usize) -> Result<Vec<EventRecord>> {
        Ok(self.store.events(from_sequence, limit)?)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn check_field(&self, field: &'static str, value: &str) -> Result<()> {
        if value.is_empty() {
            return Err(LedgerError::EmptyField { field });
        }
        if value.len() > self.config.max_field_len {
            return Err(LedgerError::FieldTooLong {
                field,
                max: self.config.max_field_len,
            });
        }
        Ok(())
    }

    fn load_active(&self, file_id: FileId) -> Result<FileRecord> {
        let record = self
            .store
            .get_file(file_id)?
            .ok_or(LedgerError::NotFound { file_id })?;
        if !record.is_active {
            return Err(LedgerError::Inactive { file_id });
        }
        Ok(record)
    }

    fn check_access(&self, file_id: FileId, address: &Address, permission: Permission) -> Result<bool> {
        let allowed = match self.store.get_file(file_id)? {
            Some(record) if record.is_active => {
                self.permits(&record, address, permission, self.clock.now_secs())?
            }
            _ => false,
        };
        debug!(%file_id, %address, ?permission, allowed, "Access check");
        Ok(allowed)
    }

    fn permits(
        &self,
        record: &FileRecord,
        address: &Address,
        permission: Permission,
        now: u64,
    ) -> Result<bool> {
        if record.is_owner(address) {
            return Ok(true);
        }
        let grant: Option<AccessGrant> = self.store.get_grant(record.id, address)?;
        Ok(grant.is_some_and(|g| match permission {
            Permission::Read => g.allows_read(now),
            Permission::Write => g.allows_write(now),
        }))
    }

    fn unauthorized(&self, caller: Address, file_id: FileId, action: &'static str) -> LedgerError {
        warn!(%file_id, %caller, action, "Rejected unauthorized call");
        LedgerError::Unauthorized {
            caller,
            file_id,
            action,
        }
    }

    fn commit(&self, mut staged: Staged) -> Result<()> {
        staged.batch.push(LedgerWrite::PutState(staged.state));
        self.store.commit(staged.batch)?;
        for record in &staged.events {
            for sink in &self.sinks {
                sink.publish(record);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::MemoryEventSink;
    use fileledger_storage::MemoryLedgerStore;

    fn ledger() -> (FileLedger<MemoryLedgerStore>, Arc<ManualClock>, MemoryEventSink) {
        let clock = Arc::new(ManualClock::new(1_000));
        let sink = MemoryEventSink::new();
        let ledger = FileLedger::new(MemoryLedgerStore::new())
            .with_clock(clock.clone())
            .with_sink(Arc::new(sink.clone()));
        (ledger, clock, sink)
    }

    fn ctx(byte: u8) -> CallerContext {
        CallerContext::new(Address([byte; 20]))
    }

    #[test]
    fn upload_assigns_dense_ids_and_stamps_time() {
        let (ledger, clock, _) = ledger();
        let first = ledger.upload(&ctx(1), NewFile::new("QmA", "a.txt", 1, "bafyA")).unwrap();
        clock.advance(7);
        let second = ledger.upload(&ctx(2), NewFile::new("QmB", "b.txt", 2, "bafyB")).unwrap();
        assert_eq!(first, FileId(1));
        assert_eq!(second, FileId(2));

        let record = ledger.file_info(second).unwrap();
        assert_eq!(record.created_at, 1_007);
        assert_eq!(record.updated_at, 1_007);
        assert_eq!(record.version_count, 1);
        assert!(record.is_active);
        assert_eq!(ledger.total_files().unwrap(), 2);
    }

    #[test]
    fn encrypted_upload_requires_key_hash() {
        let (ledger, _, _) = ledger();
        let mut file = NewFile::new("QmA", "a.txt", 1, "bafyA");
        file.is_encrypted = true;
        let err = ledger.upload(&ctx(1), file).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::EmptyField {
                field: "master_key_hash"
            }
        ));

        let id = ledger
            .upload(&ctx(1), NewFile::new("QmA", "a.txt", 1, "bafyA").encrypted("kh"))
            .unwrap();
        let record = ledger.file_info(id).unwrap();
        assert!(record.is_encrypted);
        assert_eq!(record.master_key_hash.as_deref(), Some("kh"));
    }

    #[test]
    fn provided_empty_key_hash_is_rejected() {
        let (ledger, _, _) = ledger();
        let mut file = NewFile::new("QmA", "a.txt", 1, "bafyA");
        file.master_key_hash = Some(String::new());
        assert_eq!(ledger.upload(&ctx(1), file).unwrap_err().kind(), "EmptyField");
    }

    #[test]
    fn overlong_fields_are_rejected() {
        let (ledger, _, _) = ledger();
        let ledger = ledger.with_config(LedgerConfig { max_field_len: 8 });
        let err = ledger
            .upload(&ctx(1), NewFile::new("Qm", "a-very-long-name.txt", 1, "bafy"))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::FieldTooLong {
                field: "file_name",
                max: 8
            }
        ));
        assert_eq!(ledger.total_files().unwrap(), 0);
    }

    #[test]
    fn events_are_numbered_and_published_after_commit() {
        let (ledger, _, sink) = ledger();
        let id = ledger.upload(&ctx(1), NewFile::new("QmA", "a.txt", 1, "bafyA")).unwrap();
        ledger.grant_read(&ctx(1), id, Address([2; 20]), 0).unwrap();

        let published = sink.records();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].sequence, 1);
        assert_eq!(published[1].sequence, 2);
        assert_eq!(published[1].event.name(), "access_granted");
        assert_eq!(ledger.events_since(1, 10).unwrap(), published);
        assert_eq!(ledger.store().ledger_state().unwrap().event_height, 2);
    }

    #[test]
    fn rejected_call_emits_nothing() {
        let (ledger, _, sink) = ledger();
        let id = ledger.upload(&ctx(1), NewFile::new("QmA", "a.txt", 1, "bafyA")).unwrap();
        sink.drain();

        let err = ledger.deactivate_file(&ctx(9), id).unwrap_err();
        assert_eq!(err.kind(), "Unauthorized");
        assert!(sink.is_empty());
        assert_eq!(ledger.store().ledger_state().unwrap().event_height, 1);
    }

    #[test]
    fn write_grant_implies_read() {
        let (ledger, _, _) = ledger();
        let id = ledger.upload(&ctx(1), NewFile::new("QmA", "a.txt", 1, "bafyA")).unwrap();
        let writer = Address([3; 20]);
        ledger.grant_write(&ctx(1), id, writer, 0).unwrap();

        assert!(ledger.has_write_access(id, &writer).unwrap());
        assert!(ledger.has_read_access(id, &writer).unwrap());
        let info = ledger.access_info(id, &writer).unwrap();
        assert!(!info.can_read);
        assert!(info.can_write);
    }

    #[test]
    fn regrant_keeps_other_flag_and_refreshes_expiry() {
        let (ledger, clock, _) = ledger();
        let id = ledger.upload(&ctx(1), NewFile::new("QmA", "a.txt", 1, "bafyA")).unwrap();
        let user = Address([4; 20]);
        ledger.grant_read(&ctx(1), id, user, 1_100).unwrap();
        clock.advance(50);
        ledger.grant_write(&ctx(1), id, user, 2_000).unwrap();

        let info = ledger.access_info(id, &user).unwrap();
        assert!(info.can_read && info.can_write);
        assert_eq!(info.granted_at, 1_050);
        assert_eq!(info.expires_at, 2_000);
        assert_eq!(ledger.users_with_access(id).unwrap(), vec![user]);
    }

    #[test]
    fn owner_and_zero_address_are_invalid_grantees() {
        let (ledger, _, _) = ledger();
        let id = ledger.upload(&ctx(1), NewFile::new("QmA", "a.txt", 1, "bafyA")).unwrap();
        for grantee in [Address([1; 20]), Address::ZERO] {
            let err = ledger.grant_read(&ctx(1), id, grantee, 0).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidGrantee { .. }));
        }
        assert!(ledger.users_with_access(id).unwrap().is_empty());
    }

    #[test]
    fn zero_address_cannot_upload() {
        let (ledger, _, sink) = ledger();
        let err = ledger
            .upload(&CallerContext::new(Address::ZERO), NewFile::new("QmA", "a.txt", 1, "bafyA"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCaller { caller } if caller.is_zero()));
        assert_eq!(ledger.total_files().unwrap(), 0);
        assert_eq!(ledger.file_id_by_hash("QmA").unwrap(), None);
        assert!(ledger.user_files(&Address::ZERO).unwrap().is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn read_write_grant_is_one_event() {
        let (ledger, _, sink) = ledger();
        let id = ledger.upload(&ctx(1), NewFile::new("QmA", "a.txt", 1, "bafyA")).unwrap();
        sink.drain();
        let user = Address([5; 20]);
        ledger.grant_read_write(&ctx(1), id, user, 1_500).unwrap();

        let published = sink.drain();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].sequence, 2);
        match &published[0].event {
            LedgerEvent::AccessGranted {
                grantee,
                can_read,
                can_write,
                expires_at,
                ..
            } => {
                assert_eq!(*grantee, user);
                assert!(*can_read && *can_write);
                assert_eq!(*expires_at, 1_500);
            }
            other => panic!("unexpected event {other:?}"),
        }
        let info = ledger.access_info(id, &user).unwrap();
        assert!(info.can_read && info.can_write);
        assert_eq!(ledger.users_with_access(id).unwrap(), vec![user]);
    }

    #[test]
    fn active_grantees_skips_revoked_and_expired() {
        let (ledger, clock, _) = ledger();
        let id = ledger.upload(&ctx(1), NewFile::new("QmA", "a.txt", 1, "bafyA")).unwrap();
        let (a, b, c) = (Address([2; 20]), Address([3; 20]), Address([4; 20]));
        ledger.grant_read(&ctx(1), id, a, 0).unwrap();
        ledger.grant_read(&ctx(1), id, b, 1_010).unwrap();
        ledger.grant_write(&ctx(1), id, c, 0).unwrap();
        ledger.revoke_access(&ctx(1), id, c).unwrap();
        clock.set(1_010);

        assert_eq!(ledger.active_grantees(id).unwrap(), vec![a]);
        assert_eq!(ledger.users_with_access(id).unwrap(), vec![a, b, c]);
    }
}
