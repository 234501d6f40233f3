//! Cell caches.
//!
//! A [`CellCache`] maps [`CellKey`]s to shared [`Cell`]s with bounded retention.
//! Every implementation guarantees that concurrent requests for the same uncached key run exactly one computation,
//! that all requesters receive the same cell (or the same error), and that a failed computation leaves the key uncached.
//!
//! Cells are held by [`Arc`], so a cell evicted from a cache remains valid for any reader still holding it.
//! An evicted cell is recomputed on its next request, so cell computations must be deterministic.

mod cell_cache_lru;
mod cell_cache_weak;

use std::sync::Arc;

pub use cell_cache_lru::{CellCacheLruCellLimit, CellCacheLruSizeLimit, EvictionListener};
pub use cell_cache_weak::CellCacheWeak;
pub use moka::notification::RemovalCause;

use crate::grid::CellKey;

use super::{Cell, CellLoadError, Element};

/// Traits for a cell cache.
pub trait CellCache<T: Element>: Send + Sync {
    /// Retrieve a cell from the cache. Returns [`None`] if the cell is not present.
    ///
    /// The cell cache implementation may modify the cache (e.g. update LRU cache) on retrieval.
    /// This never blocks on an in-flight computation.
    fn get(&self, key: CellKey) -> Option<Arc<Cell<T>>>;

    /// Insert a cell into the cache.
    fn insert(&self, key: CellKey, cell: Arc<Cell<T>>);

    /// Get a cell from the cache, or compute it with `f` and insert it.
    ///
    /// At most one `f` runs per key at a time.
    /// Other requesters of the same key block until it resolves and receive its outcome.
    ///
    /// # Errors
    /// Returns the error of `f`, shared between all waiting requesters. Nothing is inserted on error.
    fn try_get_or_insert_with<F>(
        &self,
        key: CellKey,
        f: F,
    ) -> Result<Arc<Cell<T>>, Arc<CellLoadError>>
    where
        F: FnOnce() -> Result<Arc<Cell<T>>, CellLoadError>;

    /// Evict the cell with `key` from the cache.
    fn invalidate(&self, key: CellKey);

    /// Evict all cells from the cache.
    fn invalidate_all(&self);

    /// Return the number of cells in the cache.
    #[must_use]
    fn len(&self) -> usize;

    /// Returns true if the cache is empty.
    #[must_use]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
