//! Notifications emitted for off-chain indexers after a committed mutation.

use crate::{Address, FileId};
use serde::{Deserialize, Serialize};

/// State change notification.
///
/// Each variant carries the fields of the call that produced it, the acting
/// address and the commit timestamp (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    FileUploaded {
        file_id: FileId,
        content_hash: String,
        file_name: String,
        owner: Address,
        metadata_cid: String,
        timestamp: u64,
    },
    FileUpdated {
        file_id: FileId,
        old_content_hash: String,
        new_content_hash: String,
        old_metadata_cid: String,
        new_metadata_cid: String,
        version: u64,
        updated_by: Address,
        timestamp: u64,
    },
    FileRolledBack {
        file_id: FileId,
        version_index: u64,
        content_hash: String,
        metadata_cid: String,
        version: u64,
        rolled_back_by: Address,
        timestamp: u64,
    },
    FileDeactivated {
        file_id: FileId,
        deactivated_by: Address,
        timestamp: u64,
    },
    AccessGranted {
        file_id: FileId,
        grantee: Address,
        can_read: bool,
        can_write: bool,
        expires_at: u64,
        granted_by: Address,
        timestamp: u64,
    },
    AccessRevoked {
        file_id: FileId,
        revokee: Address,
        revoked_by: Address,
        timestamp: u64,
    },
}

impl LedgerEvent {
    pub fn file_id(&self) -> FileId {
        match self {
            LedgerEvent::FileUploaded { file_id, .. }
            | LedgerEvent::FileUpdated { file_id, .. }
            | LedgerEvent::FileRolledBack { file_id, .. }
            | LedgerEvent::FileDeactivated { file_id, .. }
            | LedgerEvent::AccessGranted { file_id, .. }
            | LedgerEvent::AccessRevoked { file_id, .. } => *file_id,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            LedgerEvent::FileUploaded { timestamp, .. }
            | LedgerEvent::FileUpdated { timestamp, .. }
            | LedgerEvent::FileRolledBack { timestamp, .. }
            | LedgerEvent::FileDeactivated { timestamp, .. }
            | LedgerEvent::AccessGranted { timestamp, .. }
            | LedgerEvent::AccessRevoked { timestamp, .. } => *timestamp,
        }
    }

    /// Address whose call produced the event.
    pub fn actor(&self) -> Address {
        match self {
            LedgerEvent::FileUploaded { owner, .. } => *owner,
            LedgerEvent::FileUpdated { updated_by, .. } => *updated_by,
            LedgerEvent::FileRolledBack { rolled_back_by, .. } => *rolled_back_by,
            LedgerEvent::FileDeactivated { deactivated_by, .. } => *deactivated_by,
            LedgerEvent::AccessGranted { granted_by, .. } => *granted_by,
            LedgerEvent::AccessRevoked { revoked_by, .. } => *revoked_by,
        }
    }

    /// Stable event name, matching the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::FileUploaded { .. } => "file_uploaded",
            LedgerEvent::FileUpdated { .. } => "file_updated",
            LedgerEvent::FileRolledBack { .. } => "file_rolled_back",
            LedgerEvent::FileDeactivated { .. } => "file_deactivated",
            LedgerEvent::AccessGranted { .. } => "access_granted",
            LedgerEvent::AccessRevoked { .. } => "access_revoked",
        }
    }
}

/// Event with its position in the ledger's event log (starting at 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    #[serde(flatten)]
    pub event: LedgerEvent,
}
