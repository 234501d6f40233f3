//! The cell grid.
//!
//! A [`Grid`] partitions the coordinate space of an array with `dimensions` into cells of a nominal `block_size`.
//! The block size need not evenly divide the dimensions, so cells on the far boundary of each axis may be truncated.
//!
//! Each grid coordinate maps to a [`CellKey`] by row-major linearisation over the grid shape.

use derive_more::Display;
use itertools::izip;
use thiserror::Error;

use crate::{
    array::{ArrayIndices, ArrayShape},
    array_subset::{ravel_indices, unravel_index, ArraySubset, IndicesIterator},
};

/// A cell key. The row-major linearised grid coordinate of a cell.
pub type CellKey = u64;

/// A grid creation error.
#[derive(Clone, Debug, Error)]
pub enum GridCreateError {
    /// The dimensions and block size have different lengths.
    #[error("block size {1:?} has a different dimensionality to dimensions {0:?}")]
    IncompatibleDimensionality(ArrayShape, ArrayShape),
    /// The grid has no axes.
    #[error("a grid must have at least one dimension")]
    ZeroDimensional,
    /// A dimension is zero.
    #[error("dimensions {0:?} must all be non-zero")]
    ZeroDimension(ArrayShape),
    /// A block size component is zero.
    #[error("block size {0:?} must be non-zero")]
    ZeroBlockSize(ArrayShape),
    /// The number of cells exceeds the range of a [`CellKey`].
    #[error("grid shape {0:?} has more cells than can be keyed by a u64")]
    TooManyCells(ArrayShape),
}

/// An invalid grid coordinate error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid grid coordinate {0:?}, must be within grid shape {1:?}")]
pub struct InvalidGridCoordError(pub ArrayIndices, pub ArrayShape);

/// An invalid cell key error.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("invalid cell key {0}, must be less than the number of cells {1}")]
pub struct InvalidCellKeyError(pub CellKey, pub u64);

/// An invalid array indices error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid array indices {0:?}, must be within array dimensions {1:?}")]
pub struct InvalidArrayIndicesError(pub ArrayIndices, pub ArrayShape);

/// A grid over an array: its dimensions paired with a nominal block size.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash)]
#[display("dimensions {dimensions:?} block size {block_size:?}")]
pub struct Grid {
    dimensions: ArrayShape,
    block_size: ArrayShape,
    grid_shape: ArrayShape,
}

impl Grid {
    /// Create a new grid over an array with `dimensions` and a nominal `block_size`.
    ///
    /// # Errors
    /// Returns a [`GridCreateError`] if the lengths of `dimensions` and `block_size` differ or are zero,
    /// if any component of either is zero, or if the number of cells exceeds [`u64::MAX`].
    pub fn new(dimensions: ArrayShape, block_size: ArrayShape) -> Result<Self, GridCreateError> {
        if dimensions.len() != block_size.len() {
            return Err(GridCreateError::IncompatibleDimensionality(
                dimensions, block_size,
            ));
        }
        if dimensions.is_empty() {
            return Err(GridCreateError::ZeroDimensional);
        }
        if dimensions.contains(&0) {
            return Err(GridCreateError::ZeroDimension(dimensions));
        }
        if block_size.contains(&0) {
            return Err(GridCreateError::ZeroBlockSize(block_size));
        }
        let grid_shape: ArrayShape = std::iter::zip(&dimensions, &block_size)
            .map(|(d, b)| d.div_ceil(*b))
            .collect();
        if grid_shape
            .iter()
            .try_fold(1u64, |num_cells, &s| num_cells.checked_mul(s))
            .is_none()
        {
            return Err(GridCreateError::TooManyCells(grid_shape));
        }
        Ok(Self {
            dimensions,
            block_size,
            grid_shape,
        })
    }

    /// Return the array dimensions.
    #[must_use]
    pub fn dimensions(&self) -> &[u64] {
        &self.dimensions
    }

    /// Return the nominal block size.
    #[must_use]
    pub fn block_size(&self) -> &[u64] {
        &self.block_size
    }

    /// Return the number of cells along each axis.
    #[must_use]
    pub fn grid_shape(&self) -> &[u64] {
        &self.grid_shape
    }

    /// Return the dimensionality of the grid.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.dimensions.len()
    }

    /// Return the total number of cells.
    #[must_use]
    pub fn num_cells(&self) -> u64 {
        self.grid_shape.iter().product()
    }

    /// Check that `grid_coord` lies within `[0, grid_shape)` on every axis.
    ///
    /// # Errors
    /// Returns [`InvalidGridCoordError`] otherwise.
    pub fn validate_grid_coord(&self, grid_coord: &[u64]) -> Result<(), InvalidGridCoordError> {
        if grid_coord.len() == self.dimensionality()
            && std::iter::zip(grid_coord, &self.grid_shape).all(|(c, s)| c < s)
        {
            Ok(())
        } else {
            Err(InvalidGridCoordError(
                grid_coord.to_vec(),
                self.grid_shape.clone(),
            ))
        }
    }

    /// Return the global offset of the min corner of the cell at `grid_coord`.
    ///
    /// # Errors
    /// Returns [`InvalidGridCoordError`] if `grid_coord` is out of bounds.
    pub fn cell_min(&self, grid_coord: &[u64]) -> Result<ArrayIndices, InvalidGridCoordError> {
        self.validate_grid_coord(grid_coord)?;
        Ok(std::iter::zip(grid_coord, &self.block_size)
            .map(|(c, b)| c * b)
            .collect())
    }

    /// Return the actual dimensions of the cell at `grid_coord`.
    ///
    /// This is the block size, except at the far boundary where it is truncated to the array dimensions.
    ///
    /// # Errors
    /// Returns [`InvalidGridCoordError`] if `grid_coord` is out of bounds.
    pub fn cell_dimensions(&self, grid_coord: &[u64]) -> Result<ArrayShape, InvalidGridCoordError> {
        self.validate_grid_coord(grid_coord)?;
        Ok(izip!(grid_coord, &self.block_size, &self.dimensions)
            .map(|(c, b, d)| std::cmp::min(*b, d - c * b))
            .collect())
    }

    /// Return the array subset of the cell at `grid_coord`.
    ///
    /// # Errors
    /// Returns [`InvalidGridCoordError`] if `grid_coord` is out of bounds.
    pub fn cell_subset(&self, grid_coord: &[u64]) -> Result<ArraySubset, InvalidGridCoordError> {
        let start = self.cell_min(grid_coord)?;
        let shape = self.cell_dimensions(grid_coord)?;
        Ok(ArraySubset::from_parts(start, shape))
    }

    /// Return the key of the cell at `grid_coord`.
    ///
    /// # Errors
    /// Returns [`InvalidGridCoordError`] if `grid_coord` is out of bounds.
    pub fn cell_key(&self, grid_coord: &[u64]) -> Result<CellKey, InvalidGridCoordError> {
        self.validate_grid_coord(grid_coord)?;
        Ok(ravel_indices(grid_coord, &self.grid_shape))
    }

    /// Return the grid coordinate of the cell with `key`. The exact inverse of [`cell_key`](Self::cell_key).
    ///
    /// # Errors
    /// Returns [`InvalidCellKeyError`] if `key` is not less than [`num_cells`](Self::num_cells).
    pub fn key_to_grid_coord(&self, key: CellKey) -> Result<ArrayIndices, InvalidCellKeyError> {
        let num_cells = self.num_cells();
        if key < num_cells {
            Ok(unravel_index(key, &self.grid_shape))
        } else {
            Err(InvalidCellKeyError(key, num_cells))
        }
    }

    /// Return the grid coordinate of the cell containing the element at `indices`.
    ///
    /// # Errors
    /// Returns [`InvalidArrayIndicesError`] if `indices` are outside the array dimensions.
    pub fn grid_coord_of(&self, indices: &[u64]) -> Result<ArrayIndices, InvalidArrayIndicesError> {
        if indices.len() == self.dimensionality()
            && std::iter::zip(indices, &self.dimensions).all(|(i, d)| i < d)
        {
            Ok(std::iter::zip(indices, &self.block_size)
                .map(|(i, b)| i / b)
                .collect())
        } else {
            Err(InvalidArrayIndicesError(
                indices.to_vec(),
                self.dimensions.clone(),
            ))
        }
    }

    /// Return the subset of grid coordinates of the cells intersecting `array_subset`.
    ///
    /// The result is empty if `array_subset` is empty. Components of `array_subset` beyond the array dimensions are ignored.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`](crate::array_subset::IncompatibleDimensionalityError) if the dimensionality of `array_subset` differs from the grid.
    pub fn cells_in_subset(
        &self,
        array_subset: &ArraySubset,
    ) -> Result<ArraySubset, crate::array_subset::IncompatibleDimensionalityError> {
        let bounded =
            array_subset.overlap(&ArraySubset::new_with_shape(self.dimensions.clone()))?;
        if bounded.is_empty() {
            return Ok(ArraySubset::new_with_shape(vec![0; self.dimensionality()]));
        }
        let start: ArrayIndices = std::iter::zip(bounded.start(), &self.block_size)
            .map(|(s, b)| s / b)
            .collect();
        let end: ArrayIndices = std::iter::zip(bounded.end_exc(), &self.block_size)
            .map(|(e, b)| e.div_ceil(*b))
            .collect();
        ArraySubset::new_with_start_end_exc(start, end)
    }

    /// Returns an iterator over the array subsets of all cells in key order.
    #[must_use]
    pub fn iter_cell_subsets(&self) -> impl Iterator<Item = ArraySubset> + '_ {
        self.iter_grid_coords().map(|grid_coord| {
            let (start, shape): (ArrayIndices, ArrayShape) = izip!(&grid_coord, &self.block_size, &self.dimensions)
                .map(|(c, b, d)| (c * b, std::cmp::min(*b, d - c * b)))
                .unzip();
            ArraySubset::from_parts(start, shape)
        })
    }

    /// Returns an iterator over all grid coordinates in key order.
    #[must_use]
    pub fn iter_grid_coords(&self) -> IndicesIterator {
        ArraySubset::new_with_shape(self.grid_shape.clone()).iter_indices()
    }
}
