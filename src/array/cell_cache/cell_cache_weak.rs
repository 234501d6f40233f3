use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use parking_lot::{Condvar, Mutex};

use crate::{
    array::{Cell, CellLoadError, Element},
    grid::CellKey,
};

use super::CellCache;

type CellResult<T> = Result<Arc<Cell<T>>, Arc<CellLoadError>>;

/// The single-assignment result of an in-flight cell computation.
struct Pending<T> {
    result: Mutex<Option<CellResult<T>>>,
    resolved: Condvar,
}

impl<T> Pending<T> {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            resolved: Condvar::new(),
        }
    }

    fn wait(&self) -> CellResult<T> {
        let mut result = self.result.lock();
        loop {
            if let Some(result) = result.as_ref() {
                return result.clone();
            }
            self.resolved.wait(&mut result);
        }
    }

    fn resolve(&self, outcome: CellResult<T>) {
        *self.result.lock() = Some(outcome);
        self.resolved.notify_all();
    }
}

enum Slot<T> {
    Loading(Arc<Pending<T>>),
    Ready(Weak<Cell<T>>),
}

/// A cell cache that retains a cell only while it is referenced outside of the cache.
///
/// This is the closest analogue of soft references: nothing is evicted while a reader holds a cell,
/// and a cell is reclaimed as soon as its last reader drops it.
///
/// The lock on the key map is held only to look up or insert a key, never while a cell is computed,
/// so computations of unrelated keys never contend.
pub struct CellCacheWeak<T> {
    slots: Mutex<HashMap<CellKey, Slot<T>>>,
}

impl<T: Element> CellCacheWeak<T> {
    /// Create a new [`CellCacheWeak`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn prune(slots: &mut HashMap<CellKey, Slot<T>>) {
        slots.retain(|_, slot| match slot {
            Slot::Loading(_) => true,
            Slot::Ready(cell) => cell.strong_count() > 0,
        });
    }
}

impl<T: Element> Default for CellCacheWeak<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves waiters and releases the key if the computation unwinds before completing.
struct LoadingGuard<'a, T> {
    cache: &'a CellCacheWeak<T>,
    key: CellKey,
    pending: Arc<Pending<T>>,
    completed: bool,
}

impl<T> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        if !self.completed {
            self.cache.slots.lock().remove(&self.key);
            self.pending
                .resolve(Err(Arc::new(CellLoadError::Panicked)));
        }
    }
}

impl<T: Element> CellCache<T> for CellCacheWeak<T> {
    fn get(&self, key: CellKey) -> Option<Arc<Cell<T>>> {
        match self.slots.lock().get(&key) {
            Some(Slot::Ready(cell)) => cell.upgrade(),
            _ => None,
        }
    }

    fn insert(&self, key: CellKey, cell: Arc<Cell<T>>) {
        let mut slots = self.slots.lock();
        if let Some(Slot::Loading(_)) = slots.get(&key) {
            // the in-flight computation installs its own result
            return;
        }
        slots.insert(key, Slot::Ready(Arc::downgrade(&cell)));
    }

    fn try_get_or_insert_with<F>(&self, key: CellKey, f: F) -> CellResult<T>
    where
        F: FnOnce() -> Result<Arc<Cell<T>>, CellLoadError>,
    {
        let pending = {
            let mut slots = self.slots.lock();
            let existing = match slots.get(&key) {
                Some(Slot::Ready(cell)) => cell.upgrade().map(Ok),
                Some(Slot::Loading(pending)) => Some(Err(pending.clone())),
                None => None,
            };
            match existing {
                Some(Ok(cell)) => {
                    log::trace!("cell {key} hit");
                    return Ok(cell);
                }
                Some(Err(pending)) => {
                    drop(slots);
                    return pending.wait();
                }
                None => {}
            }
            if slots.len() >= 64 && slots.len().is_power_of_two() {
                Self::prune(&mut slots);
            }
            let pending = Arc::new(Pending::new());
            slots.insert(key, Slot::Loading(pending.clone()));
            pending
        };

        let mut guard = LoadingGuard {
            cache: self,
            key,
            pending: pending.clone(),
            completed: false,
        };
        let outcome = f().map_err(Arc::new);
        {
            let mut slots = self.slots.lock();
            match &outcome {
                Ok(cell) => slots.insert(key, Slot::Ready(Arc::downgrade(cell))),
                Err(_) => slots.remove(&key),
            };
        }
        guard.completed = true;
        pending.resolve(outcome.clone());
        outcome
    }

    fn invalidate(&self, key: CellKey) {
        let mut slots = self.slots.lock();
        if let Some(Slot::Ready(_)) = slots.get(&key) {
            slots.remove(&key);
        }
    }

    fn invalidate_all(&self) {
        self.slots
            .lock()
            .retain(|_, slot| matches!(slot, Slot::Loading(_)));
    }

    fn len(&self) -> usize {
        let mut slots = self.slots.lock();
        Self::prune(&mut slots);
        slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Barrier,
    };

    use crate::array_subset::ArraySubset;

    use super::*;

    fn cell(key: CellKey) -> Result<Arc<Cell<u8>>, CellLoadError> {
        let subset = ArraySubset::new_with_ranges(&[0..2]);
        Ok(Arc::new(Cell::new(key, subset, vec![1, 2])?))
    }

    #[test]
    fn cell_cache_weak_retains_while_referenced() {
        let cache = CellCacheWeak::<u8>::new();
        let held = cache.try_get_or_insert_with(0, || cell(0)).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&cache.get(0).unwrap(), &held));
        drop(held);
        assert!(cache.get(0).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn cell_cache_weak_single_flight() {
        let cache = CellCacheWeak::<u8>::new();
        let computations = AtomicUsize::new(0);
        let barrier = Barrier::new(8);
        let cells: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache
                            .try_get_or_insert_with(5, || {
                                computations.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(std::time::Duration::from_millis(50));
                                cell(5)
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(computations.load(Ordering::SeqCst), 1);
        assert!(cells.iter().all(|c| Arc::ptr_eq(c, &cells[0])));
    }

    #[test]
    fn cell_cache_weak_error_not_cached() {
        let cache = CellCacheWeak::<u8>::new();
        assert!(cache
            .try_get_or_insert_with(1, || Err(CellLoadError::InvalidLength(0, 2)))
            .is_err());
        let held = cache.try_get_or_insert_with(1, || cell(1)).unwrap();
        assert_eq!(held.data(), &[1, 2]);
    }

    #[test]
    fn cell_cache_weak_panic_releases_key() {
        let cache = CellCacheWeak::<u8>::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = cache.try_get_or_insert_with(2, || panic!("loader failure"));
        }));
        assert!(result.is_err());
        let held = cache.try_get_or_insert_with(2, || cell(2)).unwrap();
        assert_eq!(held.key(), 2);
    }
}
