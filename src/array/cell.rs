use crate::{
    array_subset::{ravel_indices, ArraySubset},
    grid::CellKey,
};

use super::{CellLoadError, Element};

/// A materialised cell: the elements of one grid coordinate of a [`Grid`](crate::grid::Grid).
///
/// The element buffer is row-major over the cell's actual dimensions.
/// Cells are immutable once created and are shared read-only by a cell cache.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell<T> {
    key: CellKey,
    subset: ArraySubset,
    data: Vec<T>,
}

impl<T: Element> Cell<T> {
    /// Create a new cell with `key` covering `subset` of the array.
    ///
    /// # Errors
    /// Returns [`CellLoadError::InvalidLength`] if `data` does not hold exactly the number of elements of `subset`.
    pub fn new(key: CellKey, subset: ArraySubset, data: Vec<T>) -> Result<Self, CellLoadError> {
        let expected = subset.num_elements_usize();
        if data.len() == expected {
            Ok(Self { key, subset, data })
        } else {
            Err(CellLoadError::InvalidLength(data.len(), expected))
        }
    }

    /// Return the cell key.
    #[must_use]
    pub fn key(&self) -> CellKey {
        self.key
    }

    /// Return the region of the array covered by the cell.
    #[must_use]
    pub fn subset(&self) -> &ArraySubset {
        &self.subset
    }

    /// Return the global offset of the min corner of the cell.
    #[must_use]
    pub fn offset(&self) -> &[u64] {
        self.subset.start()
    }

    /// Return the actual dimensions of the cell.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        self.subset.shape()
    }

    /// Return the cell elements.
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Return the size of the cell elements in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of_val(self.data.as_slice())
    }

    /// Return the element at `local_indices` relative to the cell offset.
    ///
    /// Returns [`None`] if `local_indices` are outside the cell.
    #[must_use]
    pub fn element(&self, local_indices: &[u64]) -> Option<T> {
        let inside = local_indices.len() == self.shape().len()
            && std::iter::zip(local_indices, self.shape()).all(|(i, s)| i < s);
        if inside {
            let index = usize::try_from(ravel_indices(local_indices, self.shape())).ok()?;
            self.data.get(index).copied()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_element() {
        let subset = ArraySubset::new_with_ranges(&[6..8, 3..6]);
        let cell = Cell::new(7, subset, vec![0u8, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(cell.key(), 7);
        assert_eq!(cell.offset(), &[6, 3]);
        assert_eq!(cell.shape(), &[2, 3]);
        assert_eq!(cell.element(&[1, 1]), Some(4));
        assert_eq!(cell.element(&[2, 0]), None);
        assert_eq!(cell.size_bytes(), 6);
    }

    #[test]
    fn cell_invalid_length() {
        let subset = ArraySubset::new_with_ranges(&[0..2, 0..2]);
        assert!(matches!(
            Cell::new(0, subset, vec![0u16; 3]),
            Err(CellLoadError::InvalidLength(3, 4))
        ));
    }
}
