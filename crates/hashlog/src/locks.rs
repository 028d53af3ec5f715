//! Per-partition write serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use hashlog_core::PartitionKey;
use tokio::sync::watch;

/// Coordination state for one partition.
#[derive(Debug)]
pub(crate) struct PartitionSlot {
    /// Held across read-last, compute and append.
    pub(crate) write: tokio::sync::Mutex<()>,
    /// Bumped after every append made through this engine.
    pub(crate) appended: watch::Sender<u64>,
}

impl PartitionSlot {
    fn new() -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            write: tokio::sync::Mutex::new(()),
            appended,
        }
    }

    pub(crate) fn notify_appended(&self) {
        self.appended.send_modify(|count| *count = count.wrapping_add(1));
    }
}

/// Storage key to slot. Slots are created on first use and never removed.
#[derive(Debug, Default)]
pub(crate) struct PartitionLocks {
    slots: Mutex<HashMap<PartitionKey, Arc<PartitionSlot>>>,
}

impl PartitionLocks {
    pub(crate) fn slot(&self, key: &PartitionKey) -> Arc<PartitionSlot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(PartitionSlot::new()))
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
