//! Rechunking.
//!
//! [`plan_rechunk`] partitions an array into independent [`GridBlock`]s for copying it from one block size to another.
//! [`rechunk`] copies a dataset between stores by running one task per grid block on a [`ParallelExecutor`].
//!
//! [`convert_slices`] builds a three-dimensional dataset from a numbered series of two-dimensional slices.

mod executor;
mod plan;
mod slice_conversion;

pub use executor::{ParallelExecutor, RayonExecutor, SerialExecutor};
pub use plan::{plan_rechunk, planning_block_size, GridBlock};
pub use slice_conversion::{
    convert_slices, MissingSlicePolicy, Slice, SliceConversion, SliceOutcome, SliceSource,
};

use crate::{
    array::ArrayShape,
    storage::{
        retrieve_array_subset, store_array_subset, DatasetAttributes, ReadableStorageTraits,
        StorageError, WritableStorageTraits,
    },
};

/// The result of a [`rechunk`].
#[derive(Debug)]
pub struct RechunkReport {
    num_grid_blocks: usize,
    failures: Vec<(GridBlock, StorageError)>,
}

impl RechunkReport {
    /// Return the number of grid blocks in the rechunk plan.
    #[must_use]
    pub fn num_grid_blocks(&self) -> usize {
        self.num_grid_blocks
    }

    /// Return the grid blocks that failed to copy, and their errors.
    #[must_use]
    pub fn failures(&self) -> &[(GridBlock, StorageError)] {
        &self.failures
    }

    /// Returns true if every grid block was copied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Copy the region of `grid_block` from dataset `name_in` of `storage_in` to dataset `name_out` of `storage_out`.
///
/// Copying a grid block is idempotent and has no effect outside its region.
///
/// # Errors
/// Returns a [`StorageError`] if the region cannot be read or written.
pub fn copy_grid_block<TStorageIn, TStorageOut>(
    storage_in: &TStorageIn,
    name_in: &str,
    storage_out: &TStorageOut,
    name_out: &str,
    grid_block: &GridBlock,
) -> Result<(), StorageError>
where
    TStorageIn: ?Sized + ReadableStorageTraits,
    TStorageOut: ?Sized + ReadableStorageTraits + WritableStorageTraits,
{
    let subset = grid_block.subset();
    let bytes = retrieve_array_subset(storage_in, name_in, &subset)?;
    store_array_subset(storage_out, name_out, &subset, &bytes)
}

/// Rechunk dataset `name_in` of `storage_in` into a new dataset `name_out` of `storage_out` with `destination_block_size`.
///
/// The destination dataset has the dimensions, data type, and compression of the source.
/// Each [`GridBlock`] of the [plan](plan_rechunk) is copied by an independent task of `executor`.
/// A failing grid block does not abort the others, and is listed in the returned [`RechunkReport`].
///
/// # Errors
/// Returns a [`StorageError`] if the source attributes cannot be read, the destination dataset cannot be created,
/// or `destination_block_size` is invalid.
pub fn rechunk<TStorageIn, TStorageOut, TExecutor>(
    storage_in: &TStorageIn,
    name_in: &str,
    storage_out: &TStorageOut,
    name_out: &str,
    destination_block_size: ArrayShape,
    executor: &TExecutor,
) -> Result<RechunkReport, StorageError>
where
    TStorageIn: ?Sized + ReadableStorageTraits,
    TStorageOut: ?Sized + ReadableStorageTraits + WritableStorageTraits,
    TExecutor: ParallelExecutor,
{
    let attributes_in = storage_in.dataset_attributes(name_in)?;
    let attributes_out = DatasetAttributes::new(
        attributes_in.dimensions().to_vec(),
        destination_block_size,
        attributes_in.data_type(),
        attributes_in.compression(),
    );
    let grid_blocks = plan_rechunk(
        attributes_in.dimensions(),
        attributes_in.block_size(),
        attributes_out.block_size(),
    )?;
    storage_out.create_dataset(name_out, &attributes_out)?;

    let num_grid_blocks = grid_blocks.len();
    log::debug!(
        "rechunking {name_in} to {name_out}: block size {:?} to {:?}, {num_grid_blocks} grid blocks",
        attributes_in.block_size(),
        attributes_out.block_size()
    );
    let results = executor.for_each(grid_blocks, |grid_block| {
        let result = copy_grid_block(storage_in, name_in, storage_out, name_out, &grid_block);
        match &result {
            Ok(()) => log::debug!("copied grid block {grid_block}"),
            Err(err) => log::warn!("failed to copy grid block {grid_block}: {err}"),
        }
        (grid_block, result)
    });
    let failures = results
        .into_iter()
        .filter_map(|(grid_block, result)| result.err().map(|err| (grid_block, err)))
        .collect();
    Ok(RechunkReport {
        num_grid_blocks,
        failures,
    })
}
