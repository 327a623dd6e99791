use std::collections::HashMap;
use std::sync::RwLock;

use super::{SlotStore, StoreError};

/// In-memory slot store for tests and runs without a state file.
#[derive(Debug, Default)]
pub struct InMemorySlotStore {
    inner: RwLock<HashMap<String, i64>>,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a slot, as if a previous run had saved it.
    pub fn with_slot(self, slot: impl Into<String>, value: i64) -> Self {
        if let Ok(mut map) = self.inner.write() {
            map.insert(slot.into(), value);
        }
        self
    }
}

impl SlotStore for InMemorySlotStore {
    fn load(&self, slot: &str) -> Result<Option<i64>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(slot).copied())
    }

    fn save(&self, slot: &str, value: i64) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        map.insert(slot.to_string(), value);
        Ok(())
    }
}
