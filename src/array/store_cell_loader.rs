use std::sync::Arc;

use crate::{
    array_subset::ArraySubset,
    grid::Grid,
    storage::ReadableStorage,
};

use super::{
    elements_from_bytes, ArrayError, CachedCellArray, CellLoadError, CellLoader, Element,
};

/// Create a [`CellLoader`] that reads the cells of dataset `name` from `storage`, along with the grid of the dataset.
///
/// Blocks absent from the store load as cells of [`Default`] elements.
///
/// # Errors
/// Returns an [`ArrayError`] if the dataset attributes cannot be read, are invalid, or the data type does not match `T`.
pub fn store_cell_loader<T: Element>(
    storage: ReadableStorage,
    name: &str,
) -> Result<(Grid, CellLoader<T>), ArrayError> {
    let attributes = storage.dataset_attributes(name)?;
    if attributes.data_type() != T::DATA_TYPE {
        return Err(ArrayError::IncompatibleDataType(
            T::DATA_TYPE,
            attributes.data_type(),
        ));
    }
    let grid = attributes.grid()?;
    let block_size = grid.block_size().to_vec();
    let name = name.to_string();
    let loader: CellLoader<T> = Arc::new(
        move |subset: &ArraySubset| -> Result<Vec<T>, CellLoadError> {
            let grid_coord: Vec<u64> = std::iter::zip(subset.start(), &block_size)
                .map(|(s, b)| s / b)
                .collect();
            let num_elements = subset.num_elements_usize();
            match storage.read_block(&name, &grid_coord)? {
                Some(bytes) => elements_from_bytes(&bytes).ok_or(CellLoadError::InvalidLength(
                    bytes.len() / std::mem::size_of::<T>(),
                    num_elements,
                )),
                None => Ok(vec![T::default(); num_elements]),
            }
        },
    );
    Ok((grid, loader))
}

impl<T: Element> CachedCellArray<T> {
    /// Open dataset `name` in `storage` as a cached cell array. Blocks are read on first access.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the dataset attributes cannot be read, are invalid, or the data type does not match `T`.
    pub fn open(storage: ReadableStorage, name: &str) -> Result<Self, ArrayError> {
        let (grid, loader) = store_cell_loader(storage, name)?;
        Ok(Self::new(grid, loader))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        array::DataType,
        storage::{store::MemoryStore, Compression, DatasetAttributes, WritableStorageTraits},
    };

    use super::*;

    #[test]
    fn cached_cell_array_open() {
        let store = Arc::new(MemoryStore::new());
        let attributes = DatasetAttributes::new(
            vec![4, 3],
            vec![2, 2],
            DataType::UInt16,
            Compression::Raw,
        );
        store.create_dataset("volume", &attributes).unwrap();
        store
            .write_block("volume", &[1, 1], bytemuck::cast_slice(&[7u16, 8]))
            .unwrap();

        let array = CachedCellArray::<u16>::open(store.clone(), "volume").unwrap();
        assert_eq!(array.get(&[2, 2]).unwrap(), 7);
        assert_eq!(array.get(&[3, 2]).unwrap(), 8);
        assert_eq!(array.get(&[0, 0]).unwrap(), 0);
        assert!(CachedCellArray::<f32>::open(store.clone(), "volume").is_err());
        assert!(CachedCellArray::<u16>::open(store, "missing").is_err());
    }
}
