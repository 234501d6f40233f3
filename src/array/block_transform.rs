//! Block transforms.
//!
//! A [`BlockTransform`] adapts a neighbourhood-aware computation into a [`CellLoader`].
//! For each output block it expands the block by a (possibly asymmetric) margin, reads the dependency region from an
//! [`ElementSource`] with out-of-bounds elements supplied by an [`Extension`] policy, invokes the computation once,
//! and crops its output to the block.

use std::sync::Arc;

use itertools::izip;

use crate::{
    array_subset::{ravel_indices, ArraySubset, IncompatibleDimensionalityError},
    grid::Grid,
};

use super::{
    ArrayError, ArrayShape, CachedCellArray, CellLoadError, CellLoader, ComputationError,
    Element, ElementSource,
};

/// A boundary extension policy. Supplies elements outside the domain of a source.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Extension<T> {
    /// Mirror with the boundary element repeated: `.. 1 0 | 0 1 2 .. n-1 | n-1 n-2 ..`.
    Mirror,
    /// Mirror without repeating the boundary element: `.. 2 1 | 0 1 2 .. n-1 | n-2 n-3 ..`.
    MirrorSingle,
    /// Replicate the nearest boundary element.
    Border,
    /// A constant value.
    Value(T),
}

impl<T> Extension<T> {
    /// Map `index` along an axis of length `size` to an in-bounds index, or [`None`] for a constant.
    fn map_index(&self, index: i64, size: u64) -> Option<u64> {
        let size = i64::try_from(size).unwrap_or(i64::MAX);
        if (0..size).contains(&index) {
            return u64::try_from(index).ok();
        }
        let mapped = match self {
            Self::Mirror => {
                let period = 2 * size;
                let index = index.rem_euclid(period);
                if index < size {
                    index
                } else {
                    period - 1 - index
                }
            }
            Self::MirrorSingle => {
                if size == 1 {
                    0
                } else {
                    let period = 2 * size - 2;
                    let index = index.rem_euclid(period);
                    if index < size {
                        index
                    } else {
                        period - index
                    }
                }
            }
            Self::Border => index.clamp(0, size - 1),
            Self::Value(_) => return None,
        };
        u64::try_from(mapped).ok()
    }
}

/// The input of a block transform: the elements of the dependency region of an output block.
///
/// The region is expressed in global coordinates and may extend beyond the source domain,
/// in which case its elements were supplied by the boundary [`Extension`].
#[derive(Clone, Debug, PartialEq)]
pub struct TransformInput<T> {
    origin: Vec<i64>,
    shape: ArrayShape,
    data: Vec<T>,
}

impl<T: Element> TransformInput<T> {
    /// Return the global coordinate of the min corner of the region. May be negative.
    #[must_use]
    pub fn origin(&self) -> &[i64] {
        &self.origin
    }

    /// Return the shape of the region.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the row-major elements of the region.
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Return the element at global coordinate `indices`, or [`None`] if it is outside the region.
    #[must_use]
    pub fn get(&self, indices: &[i64]) -> Option<T> {
        if indices.len() != self.origin.len() {
            return None;
        }
        let mut local = Vec::with_capacity(indices.len());
        for (&index, &origin, &size) in izip!(indices, &self.origin, &self.shape) {
            let offset = u64::try_from(index.checked_sub(origin)?).ok()?;
            if offset >= size {
                return None;
            }
            local.push(offset);
        }
        let index = usize::try_from(ravel_indices(&local, &self.shape)).ok()?;
        self.data.get(index).copied()
    }
}

/// The output of a block transform: the elements of a region containing the requested output block.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformOutput<T> {
    subset: ArraySubset,
    data: Vec<T>,
}

impl<T: Element> TransformOutput<T> {
    /// Create a new transform output holding the row-major `data` of `subset`.
    #[must_use]
    pub fn new(subset: ArraySubset, data: Vec<T>) -> Self {
        Self { subset, data }
    }
}

/// A block transform function.
///
/// Called with the dependency region of an output block and the output block itself.
/// Returns elements for a region that contains the output block; any elements beyond it are discarded.
pub type BlockTransformFn<T> = Arc<
    dyn Fn(&TransformInput<T>, &ArraySubset) -> Result<TransformOutput<T>, ComputationError>
        + Send
        + Sync,
>;

/// A neighbourhood-aware computation over an [`ElementSource`], usable as a [`CellLoader`].
#[derive(Clone)]
pub struct BlockTransform<T: Element> {
    source: Arc<dyn ElementSource<T>>,
    margin_lower: ArrayShape,
    margin_upper: ArrayShape,
    extension: Extension<T>,
    function: BlockTransformFn<T>,
}

impl<T: Element> BlockTransform<T> {
    /// Create a new block transform of `source` by `function`.
    ///
    /// Each output block is expanded by `margin_lower` below and `margin_upper` above on every axis,
    /// and elements of the expanded region outside `source` are supplied by `extension`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if a margin does not match the dimensionality of `source`.
    pub fn new(
        source: Arc<dyn ElementSource<T>>,
        margin_lower: ArrayShape,
        margin_upper: ArrayShape,
        extension: Extension<T>,
        function: impl Fn(&TransformInput<T>, &ArraySubset) -> Result<TransformOutput<T>, ComputationError>
            + Send
            + Sync
            + 'static,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        let dimensionality = source.shape().len();
        for margin in [&margin_lower, &margin_upper] {
            if margin.len() != dimensionality {
                return Err(IncompatibleDimensionalityError::new(
                    margin.len(),
                    dimensionality,
                ));
            }
        }
        Ok(Self {
            source,
            margin_lower,
            margin_upper,
            extension,
            function: Arc::new(function),
        })
    }

    /// Create a new block transform with the same `margin` below and above on every axis.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if `margin` does not match the dimensionality of `source`.
    pub fn new_symmetric(
        source: Arc<dyn ElementSource<T>>,
        margin: ArrayShape,
        extension: Extension<T>,
        function: impl Fn(&TransformInput<T>, &ArraySubset) -> Result<TransformOutput<T>, ComputationError>
            + Send
            + Sync
            + 'static,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        Self::new(source, margin.clone(), margin, extension, function)
    }

    /// Return the dimensions of the source, which are also the dimensions of the output.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        self.source.shape()
    }

    /// Return the dependency region of `block`: the block expanded by the margins, in global coordinates.
    #[must_use]
    pub fn dependency_region(&self, block: &ArraySubset) -> (Vec<i64>, ArrayShape) {
        let origin = std::iter::zip(block.start(), &self.margin_lower)
            .map(|(&start, &margin)| to_i64(start) - to_i64(margin))
            .collect();
        let shape = izip!(block.shape(), &self.margin_lower, &self.margin_upper)
            .map(|(size, lower, upper)| size + lower + upper)
            .collect();
        (origin, shape)
    }

    /// Read the dependency region of `block` from the source, extended at the boundary.
    #[allow(clippy::cast_possible_truncation)]
    fn read_input(&self, block: &ArraySubset) -> Result<TransformInput<T>, CellLoadError> {
        let source_shape = self.source.shape();
        let (origin, shape) = self.dependency_region(block);

        // per axis, the source index of each position of the region
        let mappings: Vec<Vec<Option<u64>>> = izip!(&origin, &shape, source_shape)
            .map(|(&origin, &size, &source_size)| {
                (0..to_i64(size))
                    .map(|offset| self.extension.map_index(origin + offset, source_size))
                    .collect()
            })
            .collect();

        // the bounding region of the source indices actually needed
        let mut read_start = Vec::with_capacity(mappings.len());
        let mut read_end = Vec::with_capacity(mappings.len());
        for mapping in &mappings {
            let mut used = mapping.iter().flatten();
            if let Some(&first) = used.next() {
                let (min, max) = used.fold((first, first), |(min, max), &i| {
                    (min.min(i), max.max(i))
                });
                read_start.push(min);
                read_end.push(max + 1);
            }
        }
        let constant = match self.extension {
            Extension::Value(value) => value,
            _ => T::default(),
        };

        let region = ArraySubset::new_with_shape(shape.clone());
        let num_elements = region.num_elements_usize();
        let data = if read_start.len() == mappings.len() {
            let read_subset = ArraySubset::new_with_start_end_exc(read_start, read_end)
                .map_err(ArrayError::from)?;
            let read = self.source.retrieve_subset(&read_subset)?;
            let mut data = Vec::with_capacity(num_elements);
            let mut local = vec![0u64; mappings.len()];
            for position in region.iter_indices() {
                let mut inside = true;
                for (local, mapping, &position, &start) in
                    izip!(local.iter_mut(), &mappings, &position, read_subset.start())
                {
                    match mapping[position as usize] {
                        Some(index) => *local = index - start,
                        None => inside = false,
                    }
                }
                data.push(if inside {
                    read[ravel_indices(&local, read_subset.shape()) as usize]
                } else {
                    constant
                });
            }
            data
        } else {
            // every element along some axis is outside the source
            vec![constant; num_elements]
        };
        Ok(TransformInput {
            origin,
            shape,
            data,
        })
    }

    /// Compute the elements of the output `block`.
    ///
    /// # Errors
    /// Returns a [`CellLoadError`] if the input cannot be read, the transform fails,
    /// or the transform output does not cover `block`.
    pub fn compute(&self, block: &ArraySubset) -> Result<Vec<T>, CellLoadError> {
        let input = self.read_input(block)?;
        let output = (self.function)(&input, block)?;
        let expected = output.subset.num_elements_usize();
        if output.data.len() != expected {
            return Err(CellLoadError::InvalidLength(output.data.len(), expected));
        }
        if output.subset == *block {
            return Ok(output.data);
        }
        if output.subset.overlap(block).ok().as_ref() != Some(block) {
            return Err(ComputationError::from(format!(
                "transform output {} does not contain block {block}",
                output.subset
            ))
            .into());
        }
        let crop = block.relative_to(output.subset.start()).map_err(ArrayError::from)?;
        Ok(crop
            .extract_elements(&output.data, output.subset.shape())
            .map_err(ArrayError::from)?)
    }

    /// Convert the block transform into a [`CellLoader`].
    #[must_use]
    pub fn into_loader(self) -> CellLoader<T> {
        Arc::new(move |block: &ArraySubset| self.compute(block))
    }

    /// Lazily process the source with this transform, returning a [`CachedCellArray`] with cells of `block_size`.
    ///
    /// # Errors
    /// Returns [`ArrayError::GridCreateError`] if `block_size` is incompatible with the source dimensions.
    pub fn process(self, block_size: ArrayShape) -> Result<CachedCellArray<T>, ArrayError> {
        let grid = Grid::new(self.shape().to_vec(), block_size)?;
        Ok(CachedCellArray::new(grid, self.into_loader()))
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
