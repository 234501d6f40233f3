//! Lazychunk global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::rechunk::MissingSlicePolicy;

/// Global configuration options for the lazychunk crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// ## Cell Cache Capacity
/// > default: `256`
///
/// The number of cells retained by the default cell cache of a [`CachedCellArray`](crate::array::CachedCellArray).
/// An explicit cache can be supplied with [`CachedCellArray::new_with_cache`](crate::array::CachedCellArray::new_with_cache).
///
/// ## Rechunk Concurrent Limit
/// > default: [`std::thread::available_parallelism`]`()`
///
/// The maximum number of grid blocks copied concurrently by the [`RayonExecutor`](crate::rechunk::RayonExecutor).
/// The concurrent limit is disabled if set to zero.
///
/// ## Missing Slice Policy
/// > default: [`MissingSlicePolicy::Skip`]
///
/// What [`convert_slices`](crate::rechunk::convert_slices) does when a source slice does not exist.
/// Skipping leaves the destination blocks unwritten, filling writes zeros.
#[derive(Debug)]
pub struct Config {
    cell_cache_capacity: u64,
    rechunk_concurrent_limit: usize,
    missing_slice_policy: MissingSlicePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cell_cache_capacity: 256,
            rechunk_concurrent_limit: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1),
            missing_slice_policy: MissingSlicePolicy::Skip,
        }
    }
}

impl Config {
    /// Get the [cell cache capacity](#cell-cache-capacity) configuration.
    #[must_use]
    pub fn cell_cache_capacity(&self) -> u64 {
        self.cell_cache_capacity
    }

    /// Set the [cell cache capacity](#cell-cache-capacity) configuration.
    pub fn set_cell_cache_capacity(&mut self, cell_cache_capacity: u64) {
        self.cell_cache_capacity = cell_cache_capacity;
    }

    /// Get the [rechunk concurrent limit](#rechunk-concurrent-limit) configuration.
    #[must_use]
    pub fn rechunk_concurrent_limit(&self) -> usize {
        self.rechunk_concurrent_limit
    }

    /// Set the [rechunk concurrent limit](#rechunk-concurrent-limit) configuration.
    pub fn set_rechunk_concurrent_limit(&mut self, concurrent_limit: usize) {
        self.rechunk_concurrent_limit = concurrent_limit;
    }

    /// Get the [missing slice policy](#missing-slice-policy) configuration.
    #[must_use]
    pub fn missing_slice_policy(&self) -> MissingSlicePolicy {
        self.missing_slice_policy
    }

    /// Set the [missing slice policy](#missing-slice-policy) configuration.
    pub fn set_missing_slice_policy(&mut self, missing_slice_policy: MissingSlicePolicy) {
        self.missing_slice_policy = missing_slice_policy;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global lazychunk configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global lazychunk configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}
