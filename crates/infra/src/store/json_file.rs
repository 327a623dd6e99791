use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::{SlotStore, StoreError};

/// Slot store backed by a small JSON object on disk (`{"gas": 3}`).
///
/// Every save rewrites the whole file through a sibling temp file and a
/// rename, so a crash mid-write leaves the previous contents in place.
#[derive(Debug)]
pub struct JsonFileSlotStore {
    path: PathBuf,
    slots: RwLock<BTreeMap<String, i64>>,
}

impl JsonFileSlotStore {
    /// Open the file at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let slots = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), slots = slots.len(), "opened slot store");
        Ok(Self {
            path,
            slots: RwLock::new(slots),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_out(&self, slots: &BTreeMap<String, i64>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let text = serde_json::to_string_pretty(slots).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("tmp");
        let written = fs::write(&tmp, text).and_then(|()| fs::rename(&tmp, &self.path));
        if written.is_err() && tmp.exists() {
            if let Err(err) = fs::remove_file(&tmp) {
                tracing::warn!(path = %tmp.display(), error = %err, "failed to remove temp state file");
            }
        }
        written.map_err(io_err)
    }
}

impl SlotStore for JsonFileSlotStore {
    fn load(&self, slot: &str) -> Result<Option<i64>, StoreError> {
        let slots = self.slots.read().map_err(|_| StoreError::Poisoned)?;
        Ok(slots.get(slot).copied())
    }

    /// The in-memory view only changes once the file has been replaced.
    fn save(&self, slot: &str, value: i64) -> Result<(), StoreError> {
        let mut slots = self.slots.write().map_err(|_| StoreError::Poisoned)?;
        let mut next = slots.clone();
        next.insert(slot.to_string(), value);
        self.write_out(&next)?;
        *slots = next;
        Ok(())
    }
}
