use crate::array_subset::{ArrayStoreElementsError, ArraySubset};

use super::{ReadableStorageTraits, StorageError, WritableStorageTraits};

/// Retrieve the bytes of `array_subset` of dataset `name` in row-major order.
///
/// Blocks absent from the store read as zeros.
///
/// # Errors
/// Returns a [`StorageError`] if the dataset cannot be read or `array_subset` is out of bounds.
pub fn retrieve_array_subset<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    name: &str,
    array_subset: &ArraySubset,
) -> Result<Vec<u8>, StorageError> {
    let attributes = storage.dataset_attributes(name)?;
    let grid = attributes.grid()?;
    if !array_subset.inbounds(grid.dimensions()) {
        return Err(StorageError::InvalidArraySubset(
            array_subset.clone(),
            grid.dimensions().to_vec(),
        ));
    }
    let element_size = attributes.data_type().size();
    let mut bytes = vec![0u8; array_subset.num_elements_usize() * element_size];
    if array_subset.is_empty() {
        return Ok(bytes);
    }
    for grid_coord in grid.cells_in_subset(array_subset)?.iter_indices() {
        let Some(block) = storage.read_block(name, &grid_coord)? else {
            continue;
        };
        let block_subset = grid.cell_subset(&grid_coord)?;
        let overlap = block_subset.overlap(array_subset)?;
        let overlap_bytes = overlap.relative_to(block_subset.start())?.extract_bytes(
            &block,
            block_subset.shape(),
            element_size,
        )?;
        overlap.relative_to(array_subset.start())?.store_bytes(
            &overlap_bytes,
            &mut bytes,
            array_subset.shape(),
            element_size,
        )?;
    }
    Ok(bytes)
}

/// Store the row-major `bytes` of `array_subset` into dataset `name`.
///
/// Blocks entirely within `array_subset` are overwritten.
/// Blocks partially within `array_subset` are read, updated, and written back, with absent blocks treated as zeros.
///
/// # Errors
/// Returns a [`StorageError`] if the dataset cannot be read or written, `array_subset` is out of bounds,
/// or the length of `bytes` does not match `array_subset`.
pub fn store_array_subset<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits>(
    storage: &TStorage,
    name: &str,
    array_subset: &ArraySubset,
    bytes: &[u8],
) -> Result<(), StorageError> {
    let attributes = storage.dataset_attributes(name)?;
    let grid = attributes.grid()?;
    if !array_subset.inbounds(grid.dimensions()) {
        return Err(StorageError::InvalidArraySubset(
            array_subset.clone(),
            grid.dimensions().to_vec(),
        ));
    }
    let element_size = attributes.data_type().size();
    let expected = array_subset.num_elements_usize() * element_size;
    if bytes.len() != expected {
        return Err(ArrayStoreElementsError::InvalidSubsetElements(bytes.len(), expected).into());
    }
    if array_subset.is_empty() {
        return Ok(());
    }
    for grid_coord in grid.cells_in_subset(array_subset)?.iter_indices() {
        let block_subset = grid.cell_subset(&grid_coord)?;
        let overlap = block_subset.overlap(array_subset)?;
        let overlap_bytes = overlap.relative_to(array_subset.start())?.extract_bytes(
            bytes,
            array_subset.shape(),
            element_size,
        )?;
        if overlap == block_subset {
            storage.write_block(name, &grid_coord, &overlap_bytes)?;
        } else {
            let mut block = storage.read_block(name, &grid_coord)?.unwrap_or_else(|| {
                vec![0u8; block_subset.num_elements_usize() * element_size]
            });
            overlap.relative_to(block_subset.start())?.store_bytes(
                &overlap_bytes,
                &mut block,
                block_subset.shape(),
                element_size,
            )?;
            storage.write_block(name, &grid_coord, &block)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{
        array::DataType,
        storage::{store::MemoryStore, Compression, DatasetAttributes},
    };

    use super::*;

    #[test]
    fn store_retrieve_array_subset() {
        let store = MemoryStore::new();
        let attributes =
            DatasetAttributes::new(vec![5, 5], vec![2, 2], DataType::UInt8, Compression::Raw);
        store.create_dataset("volume", &attributes).unwrap();

        // unwritten blocks read as zeros
        let all = ArraySubset::new_with_shape(vec![5, 5]);
        assert_eq!(retrieve_array_subset(&store, "volume", &all).unwrap(), vec![0; 25]);

        // a partial write spanning four blocks
        let subset = ArraySubset::new_with_ranges(&[1..3, 1..4]);
        store_array_subset(&store, "volume", &subset, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(
            retrieve_array_subset(&store, "volume", &all).unwrap(),
            vec![
                0, 0, 0, 0, 0, //
                0, 1, 2, 3, 0, //
                0, 4, 5, 6, 0, //
                0, 0, 0, 0, 0, //
                0, 0, 0, 0, 0, //
            ]
        );
        assert_eq!(store.read_block("volume", &[0, 0]).unwrap(), Some(vec![0, 0, 0, 1]));
        assert_eq!(store.read_block("volume", &[2, 2]).unwrap(), None);

        // the boundary block [2, 2] is 1x1
        let corner = ArraySubset::new_with_ranges(&[4..5, 4..5]);
        store_array_subset(&store, "volume", &corner, &[9]).unwrap();
        assert_eq!(store.read_block("volume", &[2, 2]).unwrap(), Some(vec![9]));
        assert_eq!(
            retrieve_array_subset(&store, "volume", &ArraySubset::new_with_ranges(&[2..5, 3..5]))
                .unwrap(),
            vec![6, 0, 0, 0, 0, 9]
        );

        assert!(store_array_subset(&store, "volume", &subset, &[1, 2]).is_err());
        assert!(matches!(
            retrieve_array_subset(&store, "volume", &ArraySubset::new_with_ranges(&[4..6, 0..1])),
            Err(StorageError::InvalidArraySubset(..))
        ));
    }
}
