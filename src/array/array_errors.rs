use std::sync::Arc;

use thiserror::Error;

use crate::{
    array_subset::{
        ArrayStoreElementsError, ArraySubset, IncompatibleArrayShapeError,
        IncompatibleDimensionalityError,
    },
    grid::{
        CellKey, GridCreateError, InvalidArrayIndicesError, InvalidCellKeyError,
        InvalidGridCoordError,
    },
    storage::StorageError,
};

use super::{ArrayShape, DataType};

/// An error raised by a block transform or any other cell computation.
///
/// Wraps the underlying error of the computation.
pub struct ComputationError(Box<dyn std::error::Error + Send + Sync>);

impl ComputationError {
    /// Create a new computation error from an underlying error.
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}

impl std::fmt::Debug for ComputationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.0, f)
    }
}

impl std::fmt::Display for ComputationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ComputationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<&str> for ComputationError {
    fn from(err: &str) -> Self {
        Self::new(err)
    }
}

impl From<String> for ComputationError {
    fn from(err: String) -> Self {
        Self::new(err)
    }
}

/// A cell load error.
///
/// Shared by every requester waiting on the failed computation of a cell.
#[derive(Debug, Error)]
pub enum CellLoadError {
    /// The cell computation failed.
    #[error(transparent)]
    Computation(#[from] ComputationError),
    /// Reading the input of the computation failed.
    #[error("failed to read the computation input: {0}")]
    Source(#[source] Box<ArrayError>),
    /// A store read failed.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// The loader produced the wrong number of elements.
    #[error("cell loader returned {0} elements, expected {1}")]
    InvalidLength(usize, usize),
    /// The loader panicked.
    #[error("cell loader panicked")]
    Panicked,
}

impl From<ArrayError> for CellLoadError {
    fn from(err: ArrayError) -> Self {
        Self::Source(Box::new(err))
    }
}

/// Array errors.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// A grid coordinate is outside the grid.
    #[error(transparent)]
    InvalidGridCoord(#[from] InvalidGridCoordError),
    /// A cell key is outside the grid.
    #[error(transparent)]
    InvalidCellKey(#[from] InvalidCellKeyError),
    /// Array indices are outside the array.
    #[error(transparent)]
    InvalidArrayIndices(#[from] InvalidArrayIndicesError),
    /// An array subset is outside the array.
    #[error("array subset {0} is out of bounds of array with dimensions {1:?}")]
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
    /// The grid is invalid.
    #[error(transparent)]
    GridCreateError(#[from] GridCreateError),
    /// The computation of a cell failed. The cell is left uncached.
    #[error("computation of cell {key} failed: {source}")]
    ComputationFailed {
        /// The key of the cell.
        key: CellKey,
        /// The error shared by all requesters of the cell.
        source: Arc<CellLoadError>,
    },
    /// A store error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// The element type does not match the dataset data type.
    #[error("element data type {0:?} does not match dataset data type {1:?}")]
    IncompatibleDataType(DataType, DataType),
}

impl ArrayError {
    /// Returns true if the error is due to an out of bounds grid coordinate, cell key, index or subset.
    #[must_use]
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(
            self,
            Self::InvalidGridCoord(_)
                | Self::InvalidCellKey(_)
                | Self::InvalidArrayIndices(_)
                | Self::InvalidArraySubset(..)
        )
    }

    /// Returns true if the error is a failed cell computation.
    #[must_use]
    pub fn is_computation_failed(&self) -> bool {
        matches!(self, Self::ComputationFailed { .. })
    }
}
