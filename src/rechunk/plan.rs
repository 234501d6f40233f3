use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{
    array::{ArrayIndices, ArrayShape},
    array_subset::{ArraySubset, IncompatibleDimensionalityError},
    grid::{Grid, GridCreateError},
};

/// A region of a rechunk, copied independently of all other grid blocks.
///
/// The same global region is read from the source layout and written to the destination layout.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display("offset {offset:?} size {size:?}")]
pub struct GridBlock {
    offset: ArrayIndices,
    size: ArrayShape,
    destination_grid_offset: ArrayIndices,
}

impl GridBlock {
    /// Return the global offset of the min corner of the grid block.
    #[must_use]
    pub fn offset(&self) -> &[u64] {
        &self.offset
    }

    /// Return the size of the grid block.
    #[must_use]
    pub fn size(&self) -> &[u64] {
        &self.size
    }

    /// Return the grid coordinate of the first destination block written by the grid block.
    #[must_use]
    pub fn destination_grid_offset(&self) -> &[u64] {
        &self.destination_grid_offset
    }

    /// Return the region of the grid block.
    #[must_use]
    pub fn subset(&self) -> ArraySubset {
        ArraySubset::from_parts(self.offset.clone(), self.size.clone())
    }

    /// Return the grid coordinates of the cells of `grid` intersecting the grid block.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the dimensionality of `grid` differs from the grid block.
    pub fn cells_in(&self, grid: &Grid) -> Result<ArraySubset, IncompatibleDimensionalityError> {
        grid.cells_in_subset(&self.subset())
    }
}

/// Return the planning block size of a rechunk from `source_block_size` to `destination_block_size`.
///
/// Per axis this is `max(source, destination)` rounded up to a multiple of the destination block size.
/// The rounding only takes effect when the destination block size does not divide a larger source block size,
/// and keeps every grid block aligned to destination blocks.
///
/// # Errors
/// Returns [`IncompatibleDimensionalityError`] if the block sizes have different dimensionality.
///
/// # Panics
/// Panics if a component of `destination_block_size` is zero.
pub fn planning_block_size(
    source_block_size: &[u64],
    destination_block_size: &[u64],
) -> Result<ArrayShape, IncompatibleDimensionalityError> {
    if source_block_size.len() != destination_block_size.len() {
        return Err(IncompatibleDimensionalityError::new(
            source_block_size.len(),
            destination_block_size.len(),
        ));
    }
    Ok(std::iter::zip(source_block_size, destination_block_size)
        .map(|(&s, &d)| s.max(d).div_ceil(d) * d)
        .collect())
}

/// Plan a rechunk of an array with `dimensions` from `source_block_size` to `destination_block_size`.
///
/// Returns grid blocks in row-major order that exactly tile `dimensions`.
/// Grid blocks are independent: each writes a disjoint set of whole destination blocks.
/// If every source block size component divides, or is divided by, the destination component,
/// each source block is read by exactly one grid block.
///
/// The grid block size is the [`planning_block_size`]. It is `max(source, destination)` per axis except where
/// the source block is larger than, but not a multiple of, the destination block. There it is rounded up to a
/// multiple of the destination block (e.g. source `[25]` and destination `[10]` plan grid blocks of `[30]`),
/// so that no destination block is written by two grid blocks.
///
/// # Errors
/// Returns a [`GridCreateError`] if either block size does not form a valid grid over `dimensions`.
///
/// # Example
/// ```rust
/// # use lazychunk::rechunk::plan_rechunk;
/// let grid_blocks = plan_rechunk(&[100], &[10], &[25])?;
/// assert_eq!(grid_blocks.len(), 4);
/// assert_eq!(grid_blocks[3].offset(), &[75]);
/// assert_eq!(grid_blocks[3].size(), &[25]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn plan_rechunk(
    dimensions: &[u64],
    source_block_size: &[u64],
    destination_block_size: &[u64],
) -> Result<Vec<GridBlock>, GridCreateError> {
    Grid::new(dimensions.to_vec(), source_block_size.to_vec())?;
    let destination_grid = Grid::new(dimensions.to_vec(), destination_block_size.to_vec())?;
    let block_size = planning_block_size(source_block_size, destination_block_size)
        .map_err(|_| {
            GridCreateError::IncompatibleDimensionality(
                source_block_size.to_vec(),
                destination_block_size.to_vec(),
            )
        })?;
    let grid = Grid::new(dimensions.to_vec(), block_size)?;
    let grid_blocks = grid
        .iter_cell_subsets()
        .map(|subset| {
            let destination_grid_offset = std::iter::zip(subset.start(), destination_grid.block_size())
                .map(|(o, d)| o / d)
                .collect();
            GridBlock {
                offset: subset.start().to_vec(),
                size: subset.shape().to_vec(),
                destination_grid_offset,
            }
        })
        .collect();
    Ok(grid_blocks)
}
