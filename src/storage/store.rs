//! The in-memory item store shared by all workers

use crate::state::{store_key, Item};
use crate::storage::snapshot;
use crate::storage::{StoreError, StoreResult, StoreSummary};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Concurrency-safe map from zero-padded id to [`Item`]
///
/// Workers only ever replace whole items through [`ItemStore::put`]; no field of
/// a stored item is mutated in place. Each id is owned by a single worker per
/// run, so two writers never race on the same key.
#[derive(Debug, Default)]
pub struct ItemStore {
    items: Mutex<BTreeMap<String, Item>>,
}

impl ItemStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given items
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let items = items.into_iter().map(|item| (item.key(), item)).collect();
        Self {
            items: Mutex::new(items),
        }
    }

    /// Loads a store from a snapshot file
    ///
    /// # Errors
    ///
    /// * `StoreError::Missing` - the file does not exist
    /// * `StoreError::Malformed` - the file is not a JSON object
    /// * `StoreError::InvalidRecord` - a record is incomplete or inconsistent
    pub fn load(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Err(StoreError::Missing(path.display().to_string()));
        }

        let bytes = std::fs::read(path)?;
        let items = snapshot::decode(&bytes)?;
        tracing::debug!("Loaded {} items from {}", items.len(), path.display());

        Ok(Self {
            items: Mutex::new(items),
        })
    }

    /// Loads the snapshot at `path`, or starts empty if there is none yet
    pub fn open(path: &Path) -> StoreResult<Self> {
        if path.exists() {
            tracing::info!("Resuming from snapshot {}", path.display());
            Self::load(path)
        } else {
            tracing::info!("No snapshot at {}, starting fresh", path.display());
            Ok(Self::new())
        }
    }

    /// Writes the whole store to `<dir>/<name>` and returns the file path
    pub fn save(&self, dir: &Path, name: &str) -> StoreResult<PathBuf> {
        let path = dir.join(name);
        let bytes = snapshot::encode(&self.lock())?;

        tracing::info!("Saving {} to {}...", name, dir.display());
        snapshot::write_atomic(&path, &bytes)?;
        tracing::info!("{} saved successfully", name);

        Ok(path)
    }

    /// Returns a copy of the item stored for `id`
    pub fn get(&self, id: u32) -> Option<Item> {
        self.lock().get(&store_key(id)).cloned()
    }

    /// Returns true if `id` is stored and its asset is on disk
    pub fn is_downloaded(&self, id: u32) -> bool {
        self.lock()
            .get(&store_key(id))
            .is_some_and(Item::is_downloaded)
    }

    /// Stores `item`, replacing whatever was stored under its id
    pub fn put(&self, item: Item) {
        self.lock().insert(item.key(), item);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Counts stored items by download state
    pub fn summary(&self) -> StoreSummary {
        let items = self.lock();
        let downloaded = items.values().filter(|item| item.is_downloaded()).count();
        let pending: Vec<u32> = items
            .values()
            .filter(|item| !item.is_downloaded())
            .map(Item::id)
            .collect();

        StoreSummary {
            total: items.len(),
            downloaded,
            pending,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Item>> {
        // Items are replaced wholesale, so a panic mid-insert cannot leave a
        // half-written record behind
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
