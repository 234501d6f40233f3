use crate::array_subset::ArraySubset;

use super::{ArrayError, ArrayShape, Element};

/// A random-accessible source of array elements.
///
/// Block transforms read their input from an element source.
/// A [`CachedCellArray`](super::CachedCellArray) is itself an element source, so lazily computed arrays can be chained.
pub trait ElementSource<T: Element>: Send + Sync {
    /// Return the dimensions of the source.
    fn shape(&self) -> &[u64];

    /// Retrieve the elements of `array_subset` in row-major order.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `array_subset` is out of bounds or the elements cannot be produced.
    fn retrieve_subset(&self, array_subset: &ArraySubset) -> Result<Vec<T>, ArrayError>;
}

/// An array held entirely in memory.
#[derive(Clone, Debug, PartialEq)]
pub struct InMemoryArray<T> {
    shape: ArrayShape,
    elements: Vec<T>,
}

impl<T: Element> InMemoryArray<T> {
    /// Create a new in-memory array with `shape` from row-major `elements`.
    ///
    /// # Errors
    /// Returns [`ArrayError::IncompatibleArrayShape`] if the number of elements does not match `shape`.
    pub fn new(shape: ArrayShape, elements: Vec<T>) -> Result<Self, ArrayError> {
        let subset = ArraySubset::new_with_shape(shape.clone());
        if elements.len() as u64 == subset.num_elements() {
            Ok(Self { shape, elements })
        } else {
            Err(crate::array_subset::IncompatibleArrayShapeError::from((shape, subset)).into())
        }
    }

    /// Create a new in-memory array with `shape`, where each element is `f(indices)`.
    pub fn from_fn(shape: ArrayShape, f: impl Fn(&[u64]) -> T) -> Self {
        let elements = ArraySubset::new_with_shape(shape.clone())
            .iter_indices()
            .map(|indices| f(&indices))
            .collect();
        Self { shape, elements }
    }

    /// Return the elements.
    #[must_use]
    pub fn elements(&self) -> &[T] {
        &self.elements
    }
}

impl<T: Element> ElementSource<T> for InMemoryArray<T> {
    fn shape(&self) -> &[u64] {
        &self.shape
    }

    fn retrieve_subset(&self, array_subset: &ArraySubset) -> Result<Vec<T>, ArrayError> {
        if !array_subset.inbounds(&self.shape) {
            return Err(ArrayError::InvalidArraySubset(
                array_subset.clone(),
                self.shape.clone(),
            ));
        }
        Ok(array_subset.extract_elements(&self.elements, &self.shape)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_array() {
        let array = InMemoryArray::from_fn(vec![3, 4], |i| (i[0] * 4 + i[1]) as u16);
        assert_eq!(array.elements().len(), 12);
        assert_eq!(
            array
                .retrieve_subset(&ArraySubset::new_with_ranges(&[1..3, 2..4]))
                .unwrap(),
            vec![6, 7, 10, 11]
        );
        assert!(array
            .retrieve_subset(&ArraySubset::new_with_ranges(&[1..4, 2..4]))
            .unwrap_err()
            .is_out_of_bounds());
        assert!(InMemoryArray::new(vec![2, 2], vec![0u8; 3]).is_err());
    }
}
