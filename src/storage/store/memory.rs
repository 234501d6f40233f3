//! An in-memory store.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::storage::StorageError;

use super::KeyValueStore;

/// An in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data_map: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of keys in the store, including dataset attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_map.read().len()
    }

    /// Returns true if the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_map.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data_map.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.data_map.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

super::impl_storage_traits!(MemoryStore);
