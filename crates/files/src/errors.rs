//! Error types for the file ledger

use fileledger_types::{Address, FileId};
use thiserror::Error;

/// Why a ledger call was rejected.
///
/// Every variant is raised before any write is staged, so a rejected call
/// leaves the ledger untouched and emits no event.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Field must not be empty: {field}")]
    EmptyField { field: &'static str },

    #[error("File size must be greater than zero")]
    InvalidSize,

    #[error("Field {field} exceeds {max} bytes")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("Content hash {content_hash} is already registered to file {existing}")]
    DuplicateHash {
        content_hash: String,
        existing: FileId,
    },

    #[error("File not found: {file_id}")]
    NotFound { file_id: FileId },

    #[error("File is inactive: {file_id}")]
    Inactive { file_id: FileId },

    #[error("Unauthorized: {caller} may not {action} file {file_id}")]
    Unauthorized {
        caller: Address,
        file_id: FileId,
        action: &'static str,
    },

    #[error("Version {index} not found for file {file_id}")]
    VersionNotFound { file_id: FileId, index: u64 },

    #[error("Invalid grantee: {grantee}")]
    InvalidGrantee { grantee: Address },

    #[error("Invalid caller: {caller}")]
    InvalidCaller { caller: Address },

    #[error("Ledger storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    /// Stable name of the error kind, suitable for API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::EmptyField { .. } => "EmptyField",
            LedgerError::InvalidSize => "InvalidSize",
            LedgerError::FieldTooLong { .. } => "FieldTooLong",
            LedgerError::DuplicateHash { .. } => "DuplicateHash",
            LedgerError::NotFound { .. } => "NotFound",
            LedgerError::Inactive { .. } => "Inactive",
            LedgerError::Unauthorized { .. } => "Unauthorized",
            LedgerError::VersionNotFound { .. } => "VersionNotFound",
            LedgerError::InvalidGrantee { .. } => "InvalidGrantee",
            LedgerError::InvalidCaller { .. } => "InvalidCaller",
            LedgerError::Storage(_) => "Storage",
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
