//! Durable integer slots.
//!
//! The only durable value in the system is the tank level, stored under a
//! named slot. Flags are never persisted: they are re-derived from the
//! gateway's restore query on every start.

pub mod in_memory;
pub mod json_file;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

pub use in_memory::InMemorySlotStore;
pub use json_file::JsonFileSlotStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt state file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("slot store lock poisoned")]
    Poisoned,
}

/// Single-writer key/value store of integer slots.
pub trait SlotStore: Send + Sync {
    fn load(&self, slot: &str) -> Result<Option<i64>, StoreError>;
    fn save(&self, slot: &str, value: i64) -> Result<(), StoreError>;
}

impl<S> SlotStore for Arc<S>
where
    S: SlotStore + ?Sized,
{
    fn load(&self, slot: &str) -> Result<Option<i64>, StoreError> {
        (**self).load(slot)
    }

    fn save(&self, slot: &str, value: i64) -> Result<(), StoreError> {
        (**self).save(slot, value)
    }
}

impl<S> SlotStore for Box<S>
where
    S: SlotStore + ?Sized,
{
    fn load(&self, slot: &str) -> Result<Option<i64>, StoreError> {
        (**self).load(slot)
    }

    fn save(&self, slot: &str, value: i64) -> Result<(), StoreError> {
        (**self).save(slot, value)
    }
}
