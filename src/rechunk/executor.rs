use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rayon_iter_concurrent_limit::iter_concurrent_limit;

use crate::config::global_config;

/// A parallel map over independent tasks.
///
/// Tasks may run in any order and on any thread, and every task runs exactly once.
/// Outputs are returned in task order.
pub trait ParallelExecutor {
    /// Apply `task_fn` to each of `tasks`.
    fn for_each<TTask, TOutput, F>(&self, tasks: Vec<TTask>, task_fn: F) -> Vec<TOutput>
    where
        TTask: Send,
        TOutput: Send,
        F: Fn(TTask) -> TOutput + Send + Sync;
}

/// A [`ParallelExecutor`] running tasks on the [`rayon`] global thread pool.
#[derive(Copy, Clone, Debug)]
pub struct RayonExecutor {
    concurrent_limit: usize,
}

impl RayonExecutor {
    /// Create a new rayon executor running at most `concurrent_limit` tasks concurrently.
    ///
    /// The concurrent limit is disabled if `concurrent_limit` is zero.
    #[must_use]
    pub fn new(concurrent_limit: usize) -> Self {
        Self { concurrent_limit }
    }

    /// Return the concurrent limit.
    #[must_use]
    pub fn concurrent_limit(&self) -> usize {
        self.concurrent_limit
    }
}

impl Default for RayonExecutor {
    /// Create a rayon executor with the [rechunk concurrent limit](crate::config::Config#rechunk-concurrent-limit).
    fn default() -> Self {
        Self::new(global_config().rechunk_concurrent_limit())
    }
}

impl ParallelExecutor for RayonExecutor {
    fn for_each<TTask, TOutput, F>(&self, tasks: Vec<TTask>, task_fn: F) -> Vec<TOutput>
    where
        TTask: Send,
        TOutput: Send,
        F: Fn(TTask) -> TOutput + Send + Sync,
    {
        if self.concurrent_limit == 0 {
            tasks.into_par_iter().map(task_fn).collect()
        } else {
            iter_concurrent_limit!(self.concurrent_limit, tasks, map, &task_fn).collect()
        }
    }
}

/// A [`ParallelExecutor`] running tasks in order on the calling thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct SerialExecutor;

impl ParallelExecutor for SerialExecutor {
    fn for_each<TTask, TOutput, F>(&self, tasks: Vec<TTask>, task_fn: F) -> Vec<TOutput>
    where
        TTask: Send,
        TOutput: Send,
        F: Fn(TTask) -> TOutput + Send + Sync,
    {
        tasks.into_iter().map(task_fn).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn square_all(executor: &impl ParallelExecutor) -> Vec<u64> {
        let count = AtomicUsize::new(0);
        let squares = executor.for_each((0..100u64).collect(), |i| {
            count.fetch_add(1, Ordering::Relaxed);
            i * i
        });
        assert_eq!(count.load(Ordering::Relaxed), 100);
        squares
    }

    #[test]
    fn executors_preserve_order() {
        let expected: Vec<u64> = (0..100).map(|i| i * i).collect();
        assert_eq!(square_all(&SerialExecutor), expected);
        assert_eq!(square_all(&RayonExecutor::new(0)), expected);
        assert_eq!(square_all(&RayonExecutor::new(3)), expected);
        assert_eq!(square_all(&RayonExecutor::default()), expected);
    }
}
