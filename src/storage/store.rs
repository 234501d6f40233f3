//! Stores.
//!
//! Both stores lay out a dataset `name` as a set of keys:
//! - `name/attributes.json`: the JSON encoded [`DatasetAttributes`], and
//! - `name/i/j/...`: the encoded block at grid coordinate `[i, j, ...]`.
//!
//! Dataset name components cannot be all digits or `attributes.json`,
//! so the keys of one dataset never collide with those of another (e.g. `vol/0` and block `[0, 0]` of `vol`).

mod filesystem;
mod memory;

pub use filesystem::{FilesystemStore, FilesystemStoreCreateError};
pub use memory::MemoryStore;

use itertools::Itertools;

use super::{DatasetAttributes, StorageError};

const ATTRIBUTES_KEY: &str = "attributes.json";

/// A key-value store underlying the dataset layout.
trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}

/// Validate a dataset name: one or more `/` separated non-empty components.
///
/// A component cannot be `.`, `..`, [`ATTRIBUTES_KEY`], or all digits like a block key component.
fn validate_dataset_name(name: &str) -> Result<(), StorageError> {
    if name.split('/').all(|component| {
        !component.is_empty()
            && component != "."
            && component != ".."
            && component != ATTRIBUTES_KEY
            && !component.bytes().all(|b| b.is_ascii_digit())
    }) {
        Ok(())
    } else {
        Err(StorageError::InvalidDatasetName(name.to_string()))
    }
}

fn attributes_key(name: &str) -> String {
    format!("{name}/{ATTRIBUTES_KEY}")
}

fn block_key(name: &str, grid_coord: &[u64]) -> String {
    format!("{name}/{}", grid_coord.iter().join("/"))
}

fn dataset_attributes(
    store: &impl KeyValueStore,
    name: &str,
) -> Result<DatasetAttributes, StorageError> {
    validate_dataset_name(name)?;
    let bytes = store
        .get(&attributes_key(name))?
        .ok_or_else(|| StorageError::DatasetNotFound(name.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| StorageError::InvalidMetadata(name.to_string(), err))
}

fn create_dataset(
    store: &impl KeyValueStore,
    name: &str,
    attributes: &DatasetAttributes,
) -> Result<(), StorageError> {
    validate_dataset_name(name)?;
    attributes.grid()?;
    let json = serde_json::to_vec_pretty(attributes)
        .map_err(|err| StorageError::InvalidMetadata(name.to_string(), err))?;
    store.set(&attributes_key(name), &json)
}

fn read_block(
    store: &impl KeyValueStore,
    name: &str,
    grid_coord: &[u64],
) -> Result<Option<Vec<u8>>, StorageError> {
    let attributes = dataset_attributes(store, name)?;
    let expected = attributes.block_size_bytes(grid_coord)?;
    let Some(encoded) = store.get(&block_key(name, grid_coord))? else {
        return Ok(None);
    };
    let bytes = attributes.compression().decode(&encoded)?;
    if bytes.len() == expected {
        Ok(Some(bytes))
    } else {
        Err(StorageError::InvalidBlockLength {
            expected,
            got: bytes.len(),
        })
    }
}

fn write_block(
    store: &impl KeyValueStore,
    name: &str,
    grid_coord: &[u64],
    bytes: &[u8],
) -> Result<(), StorageError> {
    let attributes = dataset_attributes(store, name)?;
    let expected = attributes.block_size_bytes(grid_coord)?;
    if bytes.len() != expected {
        return Err(StorageError::InvalidBlockLength {
            expected,
            got: bytes.len(),
        });
    }
    let encoded = attributes.compression().encode(bytes)?;
    store.set(&block_key(name, grid_coord), &encoded)
}

/// Implement the storage traits for a [`KeyValueStore`].
macro_rules! impl_storage_traits {
    ($store:ty) => {
        impl $crate::storage::ReadableStorageTraits for $store {
            fn dataset_attributes(
                &self,
                name: &str,
            ) -> Result<$crate::storage::DatasetAttributes, $crate::storage::StorageError> {
                super::dataset_attributes(self, name)
            }

            fn read_block(
                &self,
                name: &str,
                grid_coord: &[u64],
            ) -> Result<Option<Vec<u8>>, $crate::storage::StorageError> {
                super::read_block(self, name, grid_coord)
            }
        }

        impl $crate::storage::WritableStorageTraits for $store {
            fn create_dataset(
                &self,
                name: &str,
                attributes: &$crate::storage::DatasetAttributes,
            ) -> Result<(), $crate::storage::StorageError> {
                super::create_dataset(self, name, attributes)
            }

            fn write_block(
                &self,
                name: &str,
                grid_coord: &[u64],
                bytes: &[u8],
            ) -> Result<(), $crate::storage::StorageError> {
                super::write_block(self, name, grid_coord, bytes)
            }
        }

        impl $crate::storage::ReadableWritableStorageTraits for $store {}
    };
}

use impl_storage_traits;
