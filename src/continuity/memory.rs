//! In-process slot store

use super::traits::{ContinuityStore, StoreError, StoreResult};
use std::sync::Mutex;

/// Slot held in memory; lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose slot is already populated.
    pub fn with_record(record: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(record.into())),
        }
    }
}

impl ContinuityStore for MemoryStore {
    fn load(&self) -> StoreResult<Option<String>> {
        Ok(self.slot.lock().map_err(|_| StoreError::Poisoned)?.clone())
    }

    fn save(&self, record: &str) -> StoreResult<()> {
        *self.slot.lock().map_err(|_| StoreError::Poisoned)? = Some(record.to_string());
        Ok(())
    }
}
