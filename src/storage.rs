//! Block storage.
//!
//! A store holds datasets: a set of [`DatasetAttributes`] and the encoded blocks of a regular [`Grid`](crate::grid::Grid).
//! Each block holds the row-major native-endian elements of one cell of the grid, sized to the actual dimensions of that cell.
//!
//! This module defines:
//! - the [`ReadableStorageTraits`] and [`WritableStorageTraits`] traits,
//! - the [`MemoryStore`](store::MemoryStore) and [`FilesystemStore`](store::FilesystemStore) stores,
//! - the [`UsageLogStorageAdapter`](storage_adapter::UsageLogStorageAdapter), and
//! - [`retrieve_array_subset`] and [`store_array_subset`] for reading and writing regions that span blocks.

mod dataset_attributes;
pub mod storage_adapter;
mod storage_sync;
pub mod store;

use std::sync::Arc;

use thiserror::Error;

use crate::{
    array::ArrayShape,
    array_subset::{
        ArrayStoreElementsError, ArraySubset, IncompatibleArrayShapeError,
        IncompatibleDimensionalityError,
    },
    grid::{GridCreateError, InvalidGridCoordError},
};

pub use dataset_attributes::{Compression, DatasetAttributes};
pub use storage_sync::{retrieve_array_subset, store_array_subset};

/// [`Arc`] wrapped readable storage.
pub type ReadableStorage = Arc<dyn ReadableStorageTraits>;

/// [`Arc`] wrapped writable storage.
pub type WritableStorage = Arc<dyn WritableStorageTraits>;

/// [`Arc`] wrapped readable and writable storage.
pub type ReadableWritableStorage = Arc<dyn ReadableWritableStorageTraits>;

/// Readable storage traits.
pub trait ReadableStorageTraits: Send + Sync {
    /// Retrieve the attributes of dataset `name`.
    ///
    /// # Errors
    /// Returns [`StorageError::DatasetNotFound`] if the dataset does not exist, or another [`StorageError`] on failure.
    fn dataset_attributes(&self, name: &str) -> Result<DatasetAttributes, StorageError>;

    /// Retrieve the decoded block at `grid_coord` of dataset `name`.
    ///
    /// Returns [`None`] if the block has never been written.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the dataset does not exist, `grid_coord` is out of bounds,
    /// or the stored block is invalid.
    fn read_block(&self, name: &str, grid_coord: &[u64]) -> Result<Option<Vec<u8>>, StorageError>;
}

/// Writable storage traits.
pub trait WritableStorageTraits: Send + Sync {
    /// Create dataset `name` with `attributes`.
    ///
    /// Overwrites the attributes of an existing dataset with the same name. Existing blocks are retained.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if `name` is invalid or the attributes cannot be stored.
    fn create_dataset(&self, name: &str, attributes: &DatasetAttributes)
        -> Result<(), StorageError>;

    /// Encode and store the block at `grid_coord` of dataset `name`.
    ///
    /// `bytes` must hold exactly the elements of the cell at `grid_coord`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the dataset does not exist, `grid_coord` is out of bounds,
    /// the length of `bytes` does not match the cell, or the block cannot be stored.
    fn write_block(&self, name: &str, grid_coord: &[u64], bytes: &[u8])
        -> Result<(), StorageError>;
}

/// A supertrait of [`ReadableStorageTraits`] and [`WritableStorageTraits`].
pub trait ReadableWritableStorageTraits: ReadableStorageTraits + WritableStorageTraits {}

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The dataset does not exist.
    #[error("dataset {0} not found")]
    DatasetNotFound(String),
    /// An invalid dataset name.
    #[error("invalid dataset name {0:?}")]
    InvalidDatasetName(String),
    /// An error parsing the attributes of a dataset.
    #[error("error parsing attributes of dataset {0}: {1}")]
    InvalidMetadata(String, serde_json::Error),
    /// The compression is not supported.
    #[error("unsupported compression {0}")]
    UnsupportedCompression(String),
    /// The dataset attributes do not describe a valid grid.
    #[error(transparent)]
    InvalidAttributes(#[from] GridCreateError),
    /// A grid coordinate is outside the grid of the dataset.
    #[error(transparent)]
    InvalidGridCoord(#[from] InvalidGridCoordError),
    /// A block has an unexpected length.
    #[error("block has length {got}, expected {expected}")]
    InvalidBlockLength {
        /// The expected length in bytes.
        expected: usize,
        /// The actual length in bytes.
        got: usize,
    },
    /// An array subset is outside the dataset.
    #[error("array subset {0} is out of bounds of dataset with dimensions {1:?}")]
    InvalidArraySubset(ArraySubset, ArrayShape),
    /// Incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// Incompatible array shape.
    #[error(transparent)]
    IncompatibleArrayShape(#[from] IncompatibleArrayShapeError),
    /// Storing elements into an array subset failed.
    #[error(transparent)]
    ArrayStoreElements(#[from] ArrayStoreElementsError),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}
