//! Append-only version history entries.

use crate::{Address, FileRecord};
use serde::{Deserialize, Serialize};

/// Immutable snapshot of a file's live content at one point in its history.
///
/// Entry 0 is the upload. Every update and every rollback appends one entry;
/// nothing is ever removed or reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub content_hash: String,
    pub file_size: u64,
    pub metadata_cid: String,
    /// Unix seconds at which this version became live.
    pub timestamp: u64,
    /// Caller that produced this version.
    pub author: Address,
    /// Source index when this entry was produced by a rollback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_from: Option<u64>,
}

impl VersionEntry {
    /// Snapshot the live content of a record.
    pub fn of(record: &FileRecord, author: Address, timestamp: u64) -> Self {
        Self {
            content_hash: record.content_hash.clone(),
            file_size: record.file_size,
            metadata_cid: record.metadata_cid.clone(),
            timestamp,
            author,
            restored_from: None,
        }
    }
}
