//! Per-file, per-address access grants.

use serde::{Deserialize, Serialize};

/// Stored permission of one address on one file.
///
/// `expires_at == 0` means the grant never expires. Expiry is evaluated
/// against the caller-supplied `now` on every check; expired grants stay
/// stored until they are revoked or refreshed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub can_read: bool,
    pub can_write: bool,
    /// Unix seconds of the latest grant call.
    pub granted_at: u64,
    /// Unix seconds after which the grant stops applying (0 = never).
    pub expires_at: u64,
}

impl AccessGrant {
    /// Whether the grant has reached its expiry at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at != 0 && now >= self.expires_at
    }

    /// Read is allowed by either flag. Write implies read.
    pub fn allows_read(&self, now: u64) -> bool {
        (self.can_read || self.can_write) && !self.is_expired(now)
    }

    pub fn allows_write(&self, now: u64) -> bool {
        self.can_write && !self.is_expired(now)
    }

    /// Grant state with the read flag raised and timestamps refreshed.
    pub fn with_read(self, now: u64, expires_at: u64) -> Self {
        Self {
            can_read: true,
            granted_at: now,
            expires_at,
            ..self
        }
    }

    /// Grant state with the write flag raised and timestamps refreshed.
    pub fn with_write(self, now: u64, expires_at: u64) -> Self {
        Self {
            can_write: true,
            granted_at: now,
            expires_at,
            ..self
        }
    }

    /// Grant state with both flags cleared. Timestamps are kept for history.
    pub fn revoked(self) -> Self {
        Self {
            can_read: false,
            can_write: false,
            ..self
        }
    }

    /// Snapshot for display, including the derived `expired` flag.
    pub fn info(&self, now: u64) -> AccessInfo {
        AccessInfo {
            can_read: self.can_read,
            can_write: self.can_write,
            granted_at: self.granted_at,
            expires_at: self.expires_at,
            expired: self.is_expired(now),
        }
    }
}

/// Raw grant plus the derived expiry flag.
///
/// This is informational only. Authorization decisions go through the
/// ledger's access checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessInfo {
    pub can_read: bool,
    pub can_write: bool,
    pub granted_at: u64,
    pub expires_at: u64,
    pub expired: bool,
}
