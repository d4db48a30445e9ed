//! Access-controlled, versioned file ledger.
//!
//! Maps dense file ids to file records, keeps every content hash unique
//! across the ledger and tracks per-file, per-address read/write grants with
//! optional expiry. Each file carries an append-only version history;
//! rollback copies an old entry forward instead of truncating.
//!
//! The ledger never touches file bytes. Content hashes and metadata CIDs are
//! opaque identifiers produced by external blob stores.

pub mod clock;
pub mod errors;
pub mod events;
pub mod ledger;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{LedgerError, Result};
pub use events::{EventSink, MemoryEventSink, TracingEventSink};
pub use ledger::{FileLedger, LedgerConfig, DEFAULT_MAX_FIELD_LEN};
