//! Array subsets.
//!
//! An [`ArraySubset`] is a hyper-rectangular region of an array, described by its start and shape.
//! It is used throughout this library to describe cells, block transform dependency regions, and rechunk grid blocks.
//!
//! This module also provides functions for copying elements or bytes between an array subset and the
//! row-major (C order) buffer of an array containing it.

mod indices_iterator;

pub use indices_iterator::IndicesIterator;

use derive_more::{Display, From};
use itertools::izip;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::array::{ArrayIndices, ArrayShape};

/// An array subset.
#[derive(
    Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Default, Serialize, Deserialize,
)]
#[display("start {start:?} shape {shape:?}")]
pub struct ArraySubset {
    /// The start of the array subset.
    start: ArrayIndices,
    /// The shape of the array subset.
    shape: ArrayShape,
}

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }
}

/// An incompatible array shape error.
#[derive(Clone, Debug, Error, From)]
#[error("incompatible array shape {0:?} with array subset {1}")]
pub struct IncompatibleArrayShapeError(ArrayShape, ArraySubset);

/// An array store elements error.
#[derive(Debug, Error)]
pub enum ArrayStoreElementsError {
    /// Invalid array shape.
    #[error(transparent)]
    IncompatibleArrayShape(#[from] IncompatibleArrayShapeError),
    /// Invalid subset elements.
    #[error("expected subset elements to have length {_1}, got {_0}")]
    InvalidSubsetElements(usize, usize),
    /// Invalid array elements.
    #[error("expected array elements to have length {_1}, got {_0}")]
    InvalidArrayElements(usize, usize),
}

impl ArraySubset {
    /// Create a new array subset with `shape` starting at the origin.
    #[must_use]
    pub fn new_with_shape(shape: ArrayShape) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape,
        }
    }

    /// Create a new array subset.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the size of `start` and `shape` do not match.
    pub fn new_with_start_shape(
        start: ArrayIndices,
        shape: ArrayShape,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() == shape.len() {
            Ok(Self { start, shape })
        } else {
            Err(IncompatibleDimensionalityError::new(
                start.len(),
                shape.len(),
            ))
        }
    }

    /// Create a new array subset from a `start` and `shape` known to have equal lengths.
    pub(crate) fn from_parts(start: ArrayIndices, shape: ArrayShape) -> Self {
        debug_assert_eq!(start.len(), shape.len());
        Self { start, shape }
    }

    /// Create a new array subset from a start and end (exclusive).
    ///
    /// Any component of `end` less than `start` produces an empty extent along that axis.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the size of `start` and `end` do not match.
    pub fn new_with_start_end_exc(
        start: ArrayIndices,
        end: ArrayIndices,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() == end.len() {
            let shape = std::iter::zip(&start, end)
                .map(|(&start, end)| end.saturating_sub(start))
                .collect();
            Ok(Self { start, shape })
        } else {
            Err(IncompatibleDimensionalityError::new(end.len(), start.len()))
        }
    }

    /// Create a new array subset from a list of [`Range`](std::ops::Range)s.
    #[must_use]
    pub fn new_with_ranges(ranges: &[std::ops::Range<u64>]) -> Self {
        let start = ranges.iter().map(|range| range.start).collect();
        let shape = ranges
            .iter()
            .map(|range| range.end.saturating_sub(range.start))
            .collect();
        Self { start, shape }
    }

    /// Return the start of the array subset.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the shape of the array subset.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the dimensionality of the array subset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Return the end (exclusive) of the array subset.
    #[must_use]
    pub fn end_exc(&self) -> ArrayIndices {
        std::iter::zip(&self.start, &self.shape)
            .map(|(start, size)| start + size)
            .collect()
    }

    /// Return the number of elements of the array subset.
    ///
    /// Equal to the product of the components of its shape.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Return the number of elements of the array subset as a `usize`.
    ///
    /// # Panics
    /// Panics if [`num_elements()`](Self::num_elements()) is greater than [`usize::MAX`].
    #[must_use]
    pub fn num_elements_usize(&self) -> usize {
        usize::try_from(self.num_elements()).unwrap()
    }

    /// Returns true if the array subset contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape.iter().any(|&size| size == 0)
    }

    /// Returns true if `indices` lie within the array subset.
    #[must_use]
    pub fn contains(&self, indices: &[u64]) -> bool {
        indices.len() == self.dimensionality()
            && izip!(indices, &self.start, &self.shape)
                .all(|(&index, &start, &size)| index >= start && index < start + size)
    }

    /// Returns true if the array subset is within the bounds of `array_shape`.
    #[must_use]
    pub fn inbounds(&self, array_shape: &[u64]) -> bool {
        if self.dimensionality() != array_shape.len() {
            return false;
        }

        for (subset_start, subset_shape, shape) in izip!(self.start(), self.shape(), array_shape) {
            if subset_start + subset_shape > *shape {
                return false;
            }
        }
        true
    }

    /// Return the overlapping (intersecting) subset of this array subset and `subset_other`.
    ///
    /// The result is empty along any axis where the subsets are disjoint.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the dimensionality of `subset_other` does not match the dimensionality of this array subset.
    pub fn overlap(&self, subset_other: &Self) -> Result<Self, IncompatibleDimensionalityError> {
        if subset_other.dimensionality() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                subset_other.dimensionality(),
                self.dimensionality(),
            ));
        }
        let mut starts = Vec::with_capacity(self.dimensionality());
        let mut shapes = Vec::with_capacity(self.dimensionality());
        for (start, size, other_start, other_size) in izip!(
            &self.start,
            &self.shape,
            subset_other.start(),
            subset_other.shape(),
        ) {
            let overlap_start = std::cmp::max(*start, *other_start);
            let overlap_end = std::cmp::min(start + size, other_start + other_size);
            starts.push(overlap_start);
            shapes.push(overlap_end.saturating_sub(overlap_start));
        }
        Ok(Self {
            start: starts,
            shape: shapes,
        })
    }

    /// Return the array subset with its start made relative to `start`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the length of `start` does not match the dimensionality of this array subset.
    ///
    /// # Panics
    /// Panics in debug builds if any component of `start` exceeds the start of this array subset.
    pub fn relative_to(&self, start: &[u64]) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                start.len(),
                self.dimensionality(),
            ));
        }
        Ok(Self {
            start: std::iter::zip(&self.start, start)
                .map(|(a, b)| {
                    debug_assert!(a >= b);
                    a - b
                })
                .collect(),
            shape: self.shape.clone(),
        })
    }

    /// Returns an iterator over the indices of elements within the array subset in row-major order.
    #[must_use]
    pub fn iter_indices(&self) -> IndicesIterator {
        IndicesIterator::new(self.clone())
    }

    /// Return the elements in this array subset from an array with shape `array_shape`.
    ///
    /// # Errors
    /// Returns [`IncompatibleArrayShapeError`] if the array subset is out of bounds of `array_shape`,
    /// or `elements` does not hold exactly the number of elements of `array_shape`.
    pub fn extract_elements<T: Copy>(
        &self,
        elements: &[T],
        array_shape: &[u64],
    ) -> Result<Vec<T>, IncompatibleArrayShapeError> {
        let num_elements = array_shape.iter().product::<u64>();
        if !self.inbounds(array_shape) || elements.len() as u64 != num_elements {
            return Err(IncompatibleArrayShapeError(
                array_shape.to_vec(),
                self.clone(),
            ));
        }
        let mut out = Vec::with_capacity(self.num_elements_usize());
        for (offset, length) in self.contiguous_runs(array_shape) {
            out.extend_from_slice(&elements[offset..offset + length]);
        }
        Ok(out)
    }

    /// Store `subset_elements` into the elements of an array with shape `array_shape` at this array subset.
    ///
    /// # Errors
    /// Returns [`ArrayStoreElementsError`] if the array subset is out of bounds of `array_shape`, or
    /// the lengths of `array_elements` or `subset_elements` are inconsistent with their shapes.
    pub fn store_elements<T: Copy>(
        &self,
        subset_elements: &[T],
        array_elements: &mut [T],
        array_shape: &[u64],
    ) -> Result<(), ArrayStoreElementsError> {
        if !self.inbounds(array_shape) {
            return Err(IncompatibleArrayShapeError(array_shape.to_vec(), self.clone()).into());
        }
        let array_num_elements = usize::try_from(array_shape.iter().product::<u64>())
            .map_err(|_| IncompatibleArrayShapeError(array_shape.to_vec(), self.clone()))?;
        if array_elements.len() != array_num_elements {
            return Err(ArrayStoreElementsError::InvalidArrayElements(
                array_elements.len(),
                array_num_elements,
            ));
        }
        if subset_elements.len() != self.num_elements_usize() {
            return Err(ArrayStoreElementsError::InvalidSubsetElements(
                subset_elements.len(),
                self.num_elements_usize(),
            ));
        }
        let mut subset_offset = 0;
        for (offset, length) in self.contiguous_runs(array_shape) {
            array_elements[offset..offset + length]
                .copy_from_slice(&subset_elements[subset_offset..subset_offset + length]);
            subset_offset += length;
        }
        Ok(())
    }

    /// Return the bytes in this array subset from an array with shape `array_shape` and `element_size`.
    ///
    /// # Errors
    /// Returns [`IncompatibleArrayShapeError`] if the array subset is incompatible with `array_shape` or the length of `bytes`.
    pub fn extract_bytes(
        &self,
        bytes: &[u8],
        array_shape: &[u64],
        element_size: usize,
    ) -> Result<Vec<u8>, IncompatibleArrayShapeError> {
        let (subset, array_shape) = self.with_element_axis(array_shape, element_size);
        subset
            .extract_elements(bytes, &array_shape)
            .map_err(|_| IncompatibleArrayShapeError(array_shape, self.clone()))
    }

    /// Store `subset_bytes` into the bytes of an array with shape `array_shape` and `element_size` at this array subset.
    ///
    /// # Errors
    /// Returns [`ArrayStoreElementsError`] if the lengths of the byte buffers are inconsistent with their shapes.
    pub fn store_bytes(
        &self,
        subset_bytes: &[u8],
        array_bytes: &mut [u8],
        array_shape: &[u64],
        element_size: usize,
    ) -> Result<(), ArrayStoreElementsError> {
        let (subset, array_shape) = self.with_element_axis(array_shape, element_size);
        subset.store_elements(subset_bytes, array_bytes, &array_shape)
    }

    /// A byte buffer is equivalent to a `u8` array with a trailing axis of length `element_size`.
    fn with_element_axis(&self, array_shape: &[u64], element_size: usize) -> (Self, ArrayShape) {
        let element_size = element_size as u64;
        let mut start = self.start.clone();
        let mut shape = self.shape.clone();
        start.push(0);
        shape.push(element_size);
        let mut array_shape = array_shape.to_vec();
        array_shape.push(element_size);
        (Self { start, shape }, array_shape)
    }

    /// Iterate over the `(offset, length)` of runs of contiguous elements of this array subset within an array of `array_shape`.
    ///
    /// The array subset must be in bounds of `array_shape`.
    fn contiguous_runs(&self, array_shape: &[u64]) -> impl Iterator<Item = (usize, usize)> + '_ {
        let dimensionality = self.dimensionality();
        let (outer, run_length) = if dimensionality == 0 {
            (Self::default(), 1)
        } else {
            let last = dimensionality - 1;
            (
                Self {
                    start: self.start[..last].to_vec(),
                    shape: self.shape[..last].to_vec(),
                },
                self.shape[last],
            )
        };
        let last_start = self.start.last().copied().unwrap_or(0);
        let array_shape = array_shape.to_vec();
        let run_length = usize::try_from(run_length).unwrap_or(usize::MAX);
        let empty = self.is_empty();
        outer
            .iter_indices()
            .filter(move |_| !empty)
            .map(move |mut indices| {
                if dimensionality > 0 {
                    indices.push(last_start);
                }
                let offset = ravel_indices(&indices, &array_shape);
                (usize::try_from(offset).unwrap_or(usize::MAX), run_length)
            })
    }
}

/// Linearise `indices` within an array of `shape` in row-major (C) order.
#[must_use]
pub fn ravel_indices(indices: &[u64], shape: &[u64]) -> u64 {
    let mut index: u64 = 0;
    let mut count = 1;
    for (i, s) in std::iter::zip(indices, shape).rev() {
        index += i * count;
        count *= s;
    }
    index
}

/// Unravel a row-major linearised `index` into the indices of an array of `shape`.
#[must_use]
pub fn unravel_index(mut index: u64, shape: &[u64]) -> ArrayIndices {
    let mut indices = vec![0; shape.len()];
    for (out, &size) in std::iter::zip(indices.iter_mut().rev(), shape.iter().rev()) {
        *out = index % size;
        index /= size;
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_subset() {
        assert!(ArraySubset::new_with_start_shape(vec![0, 0], vec![10, 10]).is_ok());
        assert!(ArraySubset::new_with_start_shape(vec![0, 0], vec![10]).is_err());
        assert!(ArraySubset::new_with_start_end_exc(vec![0, 0], vec![10, 10]).is_ok());
        assert!(ArraySubset::new_with_start_end_exc(vec![0, 0], vec![10]).is_err());
        let array_subset = ArraySubset::new_with_ranges(&[0..5, 5..10]);
        assert_eq!(array_subset.start(), &[0, 5]);
        assert_eq!(array_subset.shape(), &[5, 5]);
        assert_eq!(array_subset.end_exc(), vec![5, 10]);
        assert_eq!(array_subset.num_elements(), 25);
        assert!(array_subset.inbounds(&[10, 10]));
        assert!(!array_subset.inbounds(&[10, 9]));
        assert!(!array_subset.inbounds(&[10]));
        assert!(array_subset.contains(&[4, 9]));
        assert!(!array_subset.contains(&[5, 9]));
        assert_eq!(array_subset.to_string(), "start [0, 5] shape [5, 5]");
    }

    #[test]
    fn array_subset_overlap() {
        let a = ArraySubset::new_with_ranges(&[0..5, 5..10]);
        let b = ArraySubset::new_with_ranges(&[3..8, 0..7]);
        assert_eq!(
            a.overlap(&b).unwrap(),
            ArraySubset::new_with_ranges(&[3..5, 5..7])
        );
        let c = ArraySubset::new_with_ranges(&[6..8, 0..7]);
        assert!(a.overlap(&c).unwrap().is_empty());
        assert!(a.overlap(&ArraySubset::new_with_ranges(&[0..1])).is_err());
        assert_eq!(
            b.relative_to(&[1, 0]).unwrap(),
            ArraySubset::new_with_ranges(&[2..7, 0..7])
        );
    }

    #[test]
    fn array_subset_iter_indices() {
        let subset = ArraySubset::new_with_ranges(&[1..3, 1..3]);
        let indices: Vec<_> = subset.iter_indices().collect();
        assert_eq!(indices, vec![vec![1, 1], vec![1, 2], vec![2, 1], vec![2, 2]]);
        assert_eq!(subset.iter_indices().len(), 4);
        assert_eq!(
            ArraySubset::new_with_ranges(&[0..0, 0..3])
                .iter_indices()
                .count(),
            0
        );
        assert_eq!(ArraySubset::default().iter_indices().count(), 1);
    }

    #[test]
    fn array_subset_extract_store_elements() {
        // 0  1  2  3
        // 4  5  6  7
        // 8  9 10 11
        let array: Vec<u16> = (0..12).collect();
        let subset = ArraySubset::new_with_ranges(&[1..3, 1..3]);
        let extracted = subset.extract_elements(&array, &[3, 4]).unwrap();
        assert_eq!(extracted, vec![5, 6, 9, 10]);
        assert!(subset.extract_elements(&array, &[2, 4]).is_err());
        assert!(subset.extract_elements(&array[1..], &[3, 4]).is_err());

        let mut out = vec![0u16; 12];
        subset.store_elements(&extracted, &mut out, &[3, 4]).unwrap();
        assert_eq!(out, vec![0, 0, 0, 0, 0, 5, 6, 0, 0, 9, 10, 0]);
        assert!(subset
            .store_elements(&extracted[1..], &mut out, &[3, 4])
            .is_err());
    }

    #[test]
    fn array_subset_extract_store_bytes() {
        let array: Vec<u16> = (0..12).collect();
        let bytes: &[u8] = bytemuck::cast_slice(&array);
        let subset = ArraySubset::new_with_ranges(&[0..3, 3..4]);
        let extracted = subset.extract_bytes(bytes, &[3, 4], 2).unwrap();
        let elements: Vec<u16> = bytemuck::pod_collect_to_vec(&extracted);
        assert_eq!(elements, vec![3, 7, 11]);

        let mut out = vec![0u8; 24];
        subset.store_bytes(&extracted, &mut out, &[3, 4], 2).unwrap();
        let out: Vec<u16> = bytemuck::pod_collect_to_vec(&out);
        assert_eq!(out, vec![0, 0, 0, 3, 0, 0, 0, 7, 0, 0, 0, 11]);
    }

    #[test]
    fn ravel_unravel() {
        let shape = [3, 4, 5];
        for index in 0..60 {
            let indices = unravel_index(index, &shape);
            assert_eq!(ravel_indices(&indices, &shape), index);
        }
        assert_eq!(unravel_index(7, &shape), vec![0, 1, 2]);
    }
}
