use std::sync::Arc;

use crate::{
    array_subset::ArraySubset,
    config::global_config,
    grid::{CellKey, Grid},
};

use super::{
    cell_cache::{CellCache, CellCacheLruCellLimit},
    ArrayError, ArrayIndices, Cell, CellLoadError, Element, ElementSource,
};

/// A cell loader. Computes the elements of a cell from the array subset it covers.
///
/// The loader must be deterministic and free of side effects, since an evicted cell is recomputed on its next access.
pub type CellLoader<T> =
    Arc<dyn Fn(&ArraySubset) -> Result<Vec<T>, CellLoadError> + Send + Sync>;

/// A virtual array whose cells are computed on first access and retained in a [`CellCache`].
///
/// Concurrent accesses to the same uncomputed cell run the loader exactly once and all receive the same [`Cell`].
/// A failed computation is returned to every waiter as [`ArrayError::ComputationFailed`] and the cell stays uncached,
/// so a later access retries from scratch.
///
/// ### Example
/// ```rust
/// # use std::sync::Arc;
/// # use lazychunk::{array::CachedCellArray, grid::Grid};
/// let grid = Grid::new(vec![8, 8], vec![3, 3])?;
/// let array = CachedCellArray::<u64>::new(
///     grid,
///     Arc::new(|subset| Ok(subset.iter_indices().map(|i| i[0] * 8 + i[1]).collect())),
/// );
/// assert_eq!(array.get(&[7, 6])?, 62);
/// let cell = array.get_cell(&[2, 2])?;
/// assert_eq!(cell.shape(), &[2, 2]);
/// assert_eq!(cell.offset(), &[6, 6]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct CachedCellArray<T: Element, C: CellCache<T> = CellCacheLruCellLimit<T>> {
    grid: Grid,
    loader: CellLoader<T>,
    cache: C,
}

impl<T: Element> CachedCellArray<T> {
    /// Create a new cached cell array over `grid` with cells computed by `loader`.
    ///
    /// Cells are retained by an LRU cache holding the [configured](crate::config::Config#cell-cache-capacity) number of cells.
    #[must_use]
    pub fn new(grid: Grid, loader: CellLoader<T>) -> Self {
        let cache = CellCacheLruCellLimit::new(global_config().cell_cache_capacity());
        Self::new_with_cache(grid, loader, cache)
    }
}

impl<T: Element, C: CellCache<T>> CachedCellArray<T, C> {
    /// Create a new cached cell array over `grid` with cells computed by `loader` and retained by `cache`.
    #[must_use]
    pub fn new_with_cache(grid: Grid, loader: CellLoader<T>, cache: C) -> Self {
        Self {
            grid,
            loader,
            cache,
        }
    }

    /// Return the dimensions of the array.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        self.grid.dimensions()
    }

    /// Return the grid.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Return the cell cache.
    #[must_use]
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Return the element at `indices`, computing its cell if it is not cached.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidArrayIndices`] if `indices` are out of bounds,
    /// or [`ArrayError::ComputationFailed`] if the cell cannot be computed.
    pub fn get(&self, indices: &[u64]) -> Result<T, ArrayError> {
        let grid_coord = self.grid.grid_coord_of(indices)?;
        let cell = self.get_cell(&grid_coord)?;
        let local_indices: ArrayIndices = std::iter::zip(indices, cell.offset())
            .map(|(i, o)| i - o)
            .collect();
        cell.element(&local_indices).ok_or_else(|| {
            crate::grid::InvalidArrayIndicesError(indices.to_vec(), self.grid.dimensions().to_vec())
                .into()
        })
    }

    /// Return the cell at `grid_coord`, computing it if it is not cached.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidGridCoord`] if `grid_coord` is out of bounds,
    /// or [`ArrayError::ComputationFailed`] if the cell cannot be computed.
    pub fn get_cell(&self, grid_coord: &[u64]) -> Result<Arc<Cell<T>>, ArrayError> {
        let key = self.grid.cell_key(grid_coord)?;
        self.get_cell_impl(key, grid_coord)
    }

    /// Return the cell with `key`, computing it if it is not cached.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidCellKey`] if `key` is out of bounds,
    /// or [`ArrayError::ComputationFailed`] if the cell cannot be computed.
    pub fn get_cell_by_key(&self, key: CellKey) -> Result<Arc<Cell<T>>, ArrayError> {
        let grid_coord = self.grid.key_to_grid_coord(key)?;
        self.get_cell_impl(key, &grid_coord)
    }

    fn get_cell_impl(&self, key: CellKey, grid_coord: &[u64]) -> Result<Arc<Cell<T>>, ArrayError> {
        let subset = self.grid.cell_subset(grid_coord)?;
        self.cache
            .try_get_or_insert_with(key, || {
                log::debug!("computing cell {key} ({subset})");
                let data = (self.loader)(&subset)?;
                Ok(Arc::new(Cell::new(key, subset, data)?))
            })
            .map_err(|source| ArrayError::ComputationFailed { key, source })
    }

    /// Return the cell at `grid_coord` if it is cached, without computing it or waiting on an in-flight computation.
    ///
    /// This is the volatile view of the array: [`None`] means the cell is not yet available.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidGridCoord`] if `grid_coord` is out of bounds.
    pub fn try_get_cell_if_cached(
        &self,
        grid_coord: &[u64],
    ) -> Result<Option<Arc<Cell<T>>>, ArrayError> {
        let key = self.grid.cell_key(grid_coord)?;
        Ok(self.cache.get(key))
    }

    /// Retrieve the elements of `array_subset` in row-major order, computing any uncached intersecting cells.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidArraySubset`] if `array_subset` is out of bounds,
    /// or [`ArrayError::ComputationFailed`] if an intersecting cell cannot be computed.
    pub fn retrieve_subset(&self, array_subset: &ArraySubset) -> Result<Vec<T>, ArrayError> {
        if !array_subset.inbounds(self.grid.dimensions()) {
            return Err(ArrayError::InvalidArraySubset(
                array_subset.clone(),
                self.grid.dimensions().to_vec(),
            ));
        }
        let mut elements = vec![T::default(); array_subset.num_elements_usize()];
        if array_subset.is_empty() {
            return Ok(elements);
        }
        for grid_coord in self.grid.cells_in_subset(array_subset)?.iter_indices() {
            let cell = self.get_cell(&grid_coord)?;
            let overlap = cell.subset().overlap(array_subset)?;
            let cell_elements = overlap
                .relative_to(cell.offset())?
                .extract_elements(cell.data(), cell.shape())?;
            overlap
                .relative_to(array_subset.start())?
                .store_elements(&cell_elements, &mut elements, array_subset.shape())?;
        }
        Ok(elements)
    }

    /// Evict the cell at `grid_coord` from the cache. It is recomputed on its next access.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidGridCoord`] if `grid_coord` is out of bounds.
    pub fn invalidate_cell(&self, grid_coord: &[u64]) -> Result<(), ArrayError> {
        let key = self.grid.cell_key(grid_coord)?;
        self.cache.invalidate(key);
        Ok(())
    }

    /// Evict all cells from the cache.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl<T: Element, C: CellCache<T>> ElementSource<T> for CachedCellArray<T, C> {
    fn shape(&self) -> &[u64] {
        self.grid.dimensions()
    }

    fn retrieve_subset(&self, array_subset: &ArraySubset) -> Result<Vec<T>, ArrayError> {
        CachedCellArray::retrieve_subset(self, array_subset)
    }
}
