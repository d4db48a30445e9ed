//! Domain types shared by the file ledger crates.

pub mod access;
pub mod address;
pub mod caller;
pub mod event;
pub mod file_record;
pub mod version;

pub use access::*;
pub use address::*;
pub use caller::*;
pub use event::*;
pub use file_record::*;
pub use version::*;
