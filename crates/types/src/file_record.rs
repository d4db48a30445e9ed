//! File records and the request payloads that create or change them.

use crate::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors emitted when parsing a file identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileIdError {
    #[error("file id must be a positive integer, got {0:?}")]
    Invalid(String),
}

/// Dense ledger identifier for a registered file.
///
/// Ids are assigned in creation order starting at 1 and are never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub u64);

impl FileId {
    pub fn get(self) -> u64 {
        self.0
    }

    /// Id allocated after this one.
    pub fn next(self) -> FileId {
        FileId(self.0.saturating_add(1))
    }

    /// Big-endian key bytes, so that byte order matches numeric order.
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        FileId(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl From<u64> for FileId {
    fn from(value: u64) -> Self {
        FileId(value)
    }
}

impl FromStr for FileId {
    type Err = FileIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(FileId(value)),
            _ => Err(FileIdError::Invalid(s.to_string())),
        }
    }
}

/// Ledger record for one registered file.
///
/// The record never stores file bytes. `content_hash` and `metadata_cid` are
/// opaque identifiers produced by the off-chain blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    /// Identifier of the current payload (in practice an IPFS CID).
    pub content_hash: String,
    pub file_name: String,
    /// Payload size in bytes, always greater than zero.
    pub file_size: u64,
    /// Pointer to the off-chain metadata document.
    pub metadata_cid: String,
    /// Uploader. Set once and never changed.
    pub owner: Address,
    /// Upload timestamp (unix seconds).
    pub created_at: u64,
    /// Timestamp of the latest version (unix seconds).
    pub updated_at: u64,
    /// Cleared by deactivation. There is no way back.
    pub is_active: bool,
    pub is_encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_key_hash: Option<String>,
    /// Number of entries in the version history, at least 1.
    pub version_count: u64,
}

impl FileRecord {
    pub fn is_owner(&self, address: &Address) -> bool {
        self.owner == *address
    }

    /// Index the next version entry will occupy.
    pub fn next_version_index(&self) -> u64 {
        self.version_count
    }
}

/// Payload of an upload call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFile {
    pub content_hash: String,
    pub file_name: String,
    pub file_size: u64,
    pub metadata_cid: String,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_key_hash: Option<String>,
}

impl NewFile {
    /// Unencrypted upload with the four required fields.
    pub fn new(
        content_hash: impl Into<String>,
        file_name: impl Into<String>,
        file_size: u64,
        metadata_cid: impl Into<String>,
    ) -> Self {
        Self {
            content_hash: content_hash.into(),
            file_name: file_name.into(),
            file_size,
            metadata_cid: metadata_cid.into(),
            is_encrypted: false,
            master_key_hash: None,
        }
    }

    /// Mark the upload as client-side encrypted under the given key hash.
    pub fn encrypted(mut self, master_key_hash: impl Into<String>) -> Self {
        self.is_encrypted = true;
        self.master_key_hash = Some(master_key_hash.into());
        self
    }
}

/// Payload of an update call: the new live content of an existing file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpdate {
    pub content_hash: String,
    pub file_size: u64,
    pub metadata_cid: String,
}

impl FileUpdate {
    pub fn new(content_hash: impl Into<String>, file_size: u64, metadata_cid: impl Into<String>) -> Self {
        Self {
            content_hash: content_hash.into(),
            file_size,
            metadata_cid: metadata_cid.into(),
        }
    }
}
