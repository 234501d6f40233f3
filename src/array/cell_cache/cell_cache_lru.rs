use std::sync::Arc;

use moka::{
    notification::RemovalCause,
    policy::EvictionPolicy,
    sync::{Cache, CacheBuilder},
};

use crate::{
    array::{Cell, CellLoadError, Element},
    grid::CellKey,
};

use super::CellCache;

/// A hook called whenever a cell leaves a cache.
pub type EvictionListener = Arc<dyn Fn(CellKey, RemovalCause) + Send + Sync>;

/// An LRU (least recently used) cell cache with a fixed cell capacity.
pub struct CellCacheLruCellLimit<T: Element> {
    cache: Cache<CellKey, Arc<Cell<T>>>,
}

/// An LRU (least recently used) cell cache with a fixed size capacity in bytes.
pub struct CellCacheLruSizeLimit<T: Element> {
    cache: Cache<CellKey, Arc<Cell<T>>>,
}

fn builder<T: Element>(
    capacity: u64,
    eviction_listener: Option<EvictionListener>,
) -> CacheBuilder<CellKey, Arc<Cell<T>>, Cache<CellKey, Arc<Cell<T>>>> {
    CacheBuilder::new(capacity)
        .eviction_policy(EvictionPolicy::lru())
        .eviction_listener(move |key: Arc<CellKey>, _cell, cause| {
            log::debug!("cell {key} removed from cache ({cause:?})");
            if let Some(eviction_listener) = &eviction_listener {
                eviction_listener(*key, cause);
            }
        })
}

impl<T: Element> CellCacheLruCellLimit<T> {
    /// Create a new [`CellCacheLruCellLimit`] with a capacity in cells of `cell_capacity`.
    #[must_use]
    pub fn new(cell_capacity: u64) -> Self {
        Self {
            cache: builder(cell_capacity, None).build(),
        }
    }

    /// Create a new [`CellCacheLruCellLimit`] with a capacity in cells of `cell_capacity`.
    ///
    /// `eviction_listener` is called with the key of every cell leaving the cache.
    #[must_use]
    pub fn new_with_eviction_listener(
        cell_capacity: u64,
        eviction_listener: EvictionListener,
    ) -> Self {
        Self {
            cache: builder(cell_capacity, Some(eviction_listener)).build(),
        }
    }
}

impl<T: Element> CellCacheLruSizeLimit<T> {
    /// Create a new [`CellCacheLruSizeLimit`] with a capacity in bytes of `capacity`.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self::new_impl(capacity, None)
    }

    /// Create a new [`CellCacheLruSizeLimit`] with a capacity in bytes of `capacity`.
    ///
    /// `eviction_listener` is called with the key of every cell leaving the cache.
    #[must_use]
    pub fn new_with_eviction_listener(capacity: u64, eviction_listener: EvictionListener) -> Self {
        Self::new_impl(capacity, Some(eviction_listener))
    }

    fn new_impl(capacity: u64, eviction_listener: Option<EvictionListener>) -> Self {
        let cache = builder(capacity, eviction_listener)
            .weigher(|_k, v: &Arc<Cell<T>>| u32::try_from(v.size_bytes()).unwrap_or(u32::MAX))
            .build();
        Self { cache }
    }
}

macro_rules! impl_CellCacheLru {
    ($cache:ident) => {
        impl<T: Element> CellCache<T> for $cache<T> {
            fn get(&self, key: CellKey) -> Option<Arc<Cell<T>>> {
                self.cache.get(&key)
            }

            fn insert(&self, key: CellKey, cell: Arc<Cell<T>>) {
                self.cache.insert(key, cell);
            }

            fn try_get_or_insert_with<F>(
                &self,
                key: CellKey,
                f: F,
            ) -> Result<Arc<Cell<T>>, Arc<CellLoadError>>
            where
                F: FnOnce() -> Result<Arc<Cell<T>>, CellLoadError>,
            {
                self.cache.try_get_with(key, f)
            }

            fn invalidate(&self, key: CellKey) {
                self.cache.invalidate(&key);
            }

            fn invalidate_all(&self) {
                self.cache.invalidate_all();
            }

            fn len(&self) -> usize {
                self.cache.run_pending_tasks();
                usize::try_from(self.cache.entry_count()).unwrap_or(usize::MAX)
            }
        }
    };
}

impl_CellCacheLru!(CellCacheLruCellLimit);
impl_CellCacheLru!(CellCacheLruSizeLimit);

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::array_subset::ArraySubset;

    use super::*;

    fn cell(key: CellKey, value: u8) -> Arc<Cell<u8>> {
        let subset = ArraySubset::new_with_ranges(&[0..2, 0..2]);
        Arc::new(Cell::new(key, subset, vec![value; 4]).unwrap())
    }

    #[test]
    fn cell_cache_lru_cell_limit() {
        let cache = CellCacheLruCellLimit::<u8>::new(2);
        assert!(cache.is_empty());
        cache.insert(0, cell(0, 0));
        cache.insert(1, cell(1, 1));
        assert_eq!(cache.get(1).unwrap().data(), &[1, 1, 1, 1]);
        assert_eq!(cache.len(), 2);
        cache.insert(2, cell(2, 2));
        cache.insert(3, cell(3, 3));
        assert!(cache.len() <= 2);
        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn cell_cache_lru_size_limit() {
        let cache = CellCacheLruSizeLimit::<u8>::new(8);
        for key in 0..4 {
            cache.insert(key, cell(key, 0));
        }
        assert!(cache.len() <= 2);
    }

    #[test]
    fn cell_cache_lru_error_not_cached() {
        let cache = CellCacheLruCellLimit::<u8>::new(4);
        let err = cache
            .try_get_or_insert_with(0, || Err(CellLoadError::InvalidLength(1, 4)))
            .unwrap_err();
        assert!(matches!(*err, CellLoadError::InvalidLength(1, 4)));
        assert!(cache.get(0).is_none());
        let ok = cache.try_get_or_insert_with(0, || Ok(cell(0, 5))).unwrap();
        assert_eq!(ok.data(), &[5, 5, 5, 5]);
        assert!(cache.get(0).is_some());
    }

    #[test]
    fn cell_cache_lru_eviction_listener() {
        let evicted = Arc::new(AtomicUsize::new(0));
        let evicted_listener = evicted.clone();
        let cache = CellCacheLruCellLimit::<u8>::new_with_eviction_listener(
            4,
            Arc::new(move |key, cause| {
                assert_eq!(key, 3);
                assert_eq!(cause, RemovalCause::Explicit);
                evicted_listener.fetch_add(1, Ordering::SeqCst);
            }),
        );
        cache.insert(3, cell(3, 0));
        cache.invalidate(3);
        let _ = cache.len(); // run pending tasks, delivering notifications
        assert_eq!(evicted.load(Ordering::SeqCst), 1);
    }
}
