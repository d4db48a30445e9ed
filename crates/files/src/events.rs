//! Delivery of committed ledger events to off-chain consumers.

use fileledger_types::EventRecord;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Receiver of committed events.
///
/// Sinks are called after the batch carrying the events has been committed,
/// in sequence order. A sink must not call back into the ledger's mutating
/// operations.
pub trait EventSink: Send + Sync {
    fn publish(&self, record: &EventRecord);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, record: &EventRecord) {
        info!(
            target: "fileledger::events",
            sequence = record.sequence,
            event = record.event.name(),
            file_id = %record.event.file_id(),
            actor = %record.event.actor(),
            timestamp = record.event.timestamp(),
            "Ledger event"
        );
    }
}

/// Collects events in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSink {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Remove and return everything collected so far.
    pub fn drain(&self) -> Vec<EventRecord> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl EventSink for MemoryEventSink {
    fn publish(&self, record: &EventRecord) {
        self.records.lock().push(record.clone());
    }
}
