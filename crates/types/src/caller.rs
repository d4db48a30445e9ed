use crate::Address;
use serde::{Deserialize, Serialize};

/// Verified identity of the party invoking a ledger operation.
///
/// The ledger trusts this value. Establishing it (wallet signature, session,
/// local operator flag) is the job of whatever hosts the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    caller: Address,
}

impl CallerContext {
    pub fn new(caller: Address) -> Self {
        Self { caller }
    }

    pub fn caller(&self) -> Address {
        self.caller
    }
}

impl From<Address> for CallerContext {
    fn from(caller: Address) -> Self {
        Self::new(caller)
    }
}
