use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Barrier, Mutex,
};

use lazychunk::{
    array::{
        block_transform::{BlockTransform, Extension, TransformInput, TransformOutput},
        cell_cache::{
            CellCache, CellCacheLruCellLimit, CellCacheLruSizeLimit, CellCacheWeak, RemovalCause,
        },
        ArrayError, CachedCellArray, CellLoader, ComputationError, DataType, ElementSource,
        InMemoryArray,
    },
    array_subset::ArraySubset,
    grid::Grid,
    storage::{
        store::MemoryStore, store_array_subset, Compression, DatasetAttributes,
        WritableStorageTraits,
    },
};

/// A loader computing `8 * i + j` and counting its invocations.
fn counting_loader(count: Arc<AtomicUsize>) -> CellLoader<u64> {
    Arc::new(move |subset: &ArraySubset| {
        count.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(20));
        Ok(subset.iter_indices().map(|i| 8 * i[0] + i[1]).collect())
    })
}

fn concurrent_get_cell<C: CellCache<u64>>(array: &CachedCellArray<u64, C>, count: &AtomicUsize) {
    const THREADS: usize = 2;
    let barrier = Barrier::new(THREADS);
    let cells = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    array.get_cell_by_key(5).unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(cells[0], cells[1]);
    assert!(Arc::ptr_eq(&cells[0], &cells[1]));
    // key 5 of a 3x3 grid
    assert_eq!(cells[0].offset(), &[3, 6]);
    assert_eq!(cells[0].shape(), &[3, 2]);
    assert_eq!(cells[0].data(), &[30, 31, 38, 39, 46, 47]);
}

#[test]
fn cached_cell_array_single_flight_lru() {
    let count = Arc::new(AtomicUsize::new(0));
    let grid = Grid::new(vec![8, 8], vec![3, 3]).unwrap();
    let array = CachedCellArray::new(grid, counting_loader(count.clone()));
    concurrent_get_cell(&array, &count);
}

#[test]
fn cached_cell_array_single_flight_weak() {
    let count = Arc::new(AtomicUsize::new(0));
    let grid = Grid::new(vec![8, 8], vec![3, 3]).unwrap();
    let array =
        CachedCellArray::new_with_cache(grid, counting_loader(count.clone()), CellCacheWeak::new());
    concurrent_get_cell(&array, &count);
}

/// A loader failing while `fail` is set, counting its invocations.
fn failing_loader(count: Arc<AtomicUsize>, fail: Arc<AtomicBool>) -> CellLoader<u64> {
    Arc::new(move |subset: &ArraySubset| {
        count.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(50));
        if fail.load(Ordering::SeqCst) {
            return Err(ComputationError::from("loader failed").into());
        }
        Ok(subset.iter_indices().map(|i| 8 * i[0] + i[1]).collect())
    })
}

fn concurrent_get_cell_failure<C: CellCache<u64>>(cache: C) {
    const THREADS: usize = 6;
    let count = Arc::new(AtomicUsize::new(0));
    let fail = Arc::new(AtomicBool::new(true));
    let grid = Grid::new(vec![8, 8], vec![3, 3]).unwrap();
    let array = CachedCellArray::new_with_cache(
        grid,
        failing_loader(count.clone(), fail.clone()),
        cache,
    );
    let barrier = Barrier::new(THREADS);
    let results = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    array.get_cell_by_key(5)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(results
        .iter()
        .all(|result| result.as_ref().is_err_and(ArrayError::is_computation_failed)));
    assert!(array.try_get_cell_if_cached(&[1, 2]).unwrap().is_none());

    fail.store(false, Ordering::SeqCst);
    let cell = array.get_cell_by_key(5).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_eq!(cell.data(), &[30, 31, 38, 39, 46, 47]);
}

#[test]
fn cached_cell_array_concurrent_failure_lru() {
    concurrent_get_cell_failure(CellCacheLruCellLimit::new(16));
}

#[test]
fn cached_cell_array_concurrent_failure_weak() {
    concurrent_get_cell_failure(CellCacheWeak::new());
}

#[test]
fn cached_cell_array_many_threads_many_keys() {
    let count = Arc::new(AtomicUsize::new(0));
    let grid = Grid::new(vec![8, 8], vec![3, 3]).unwrap();
    let array = CachedCellArray::new(grid, counting_loader(count.clone()));
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for key in 0..9 {
                    let cell = array.get_cell_by_key(key).unwrap();
                    assert_eq!(cell.key(), key);
                }
            });
        }
    });
    assert_eq!(count.load(Ordering::SeqCst), 9);
}

#[test]
fn cached_cell_array_recompute_after_eviction() {
    let count = Arc::new(AtomicUsize::new(0));
    let grid = Grid::new(vec![8, 8], vec![3, 3]).unwrap();
    let array = CachedCellArray::new(grid, counting_loader(count.clone()));

    assert!(array.try_get_cell_if_cached(&[2, 2]).unwrap().is_none());
    let cell = array.get_cell(&[2, 2]).unwrap();
    assert_eq!(cell.shape(), &[2, 2]);
    assert_eq!(cell.offset(), &[6, 6]);
    assert!(array.try_get_cell_if_cached(&[2, 2]).unwrap().is_some());

    array.invalidate_cell(&[2, 2]).unwrap();
    assert!(array.try_get_cell_if_cached(&[2, 2]).unwrap().is_none());
    // the evicted cell is still valid for its holder
    assert_eq!(cell.data(), &[54, 55, 62, 63]);

    let recomputed = array.get_cell(&[2, 2]).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_eq!(*recomputed, *cell);

    array.invalidate_all();
    assert_eq!(array.get(&[7, 7]).unwrap(), 63);
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
fn cached_cell_array_size_limited_eviction() {
    let count = Arc::new(AtomicUsize::new(0));
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let cache = {
        let evicted = evicted.clone();
        // room for two 3x3 cells of u64
        CellCacheLruSizeLimit::new_with_eviction_listener(
            2 * 9 * 8,
            Arc::new(move |key, cause| {
                if cause == RemovalCause::Size {
                    evicted.lock().unwrap().push(key);
                }
            }),
        )
    };
    let grid = Grid::new(vec![9, 9], vec![3, 3]).unwrap();
    let array = CachedCellArray::new_with_cache(grid, counting_loader(count.clone()), cache);

    let eager: Vec<u64> = ArraySubset::new_with_shape(vec![9, 9])
        .iter_indices()
        .map(|i| 8 * i[0] + i[1])
        .collect();
    for _ in 0..2 {
        let all = array
            .retrieve_subset(&ArraySubset::new_with_shape(vec![9, 9]))
            .unwrap();
        assert_eq!(all, eager);
        assert!(array.cache().len() <= 2);
    }
    assert!(count.load(Ordering::SeqCst) > 9);
    assert!(!evicted.lock().unwrap().is_empty());
}

#[test]
fn cached_cell_array_out_of_bounds() {
    let grid = Grid::new(vec![8, 8], vec![3, 3]).unwrap();
    let array = CachedCellArray::new(grid, counting_loader(Arc::default()));
    assert!(array.get(&[8, 0]).unwrap_err().is_out_of_bounds());
    assert!(array.get(&[0]).unwrap_err().is_out_of_bounds());
    assert!(array.get_cell(&[3, 0]).unwrap_err().is_out_of_bounds());
    assert!(array.get_cell_by_key(9).unwrap_err().is_out_of_bounds());
    assert!(array
        .retrieve_subset(&ArraySubset::new_with_ranges(&[0..9, 0..1]))
        .unwrap_err()
        .is_out_of_bounds());
}

/// A 3x3 mean filter evaluated eagerly over the whole array with mirrored boundaries.
fn mean_filter_eager(source: &InMemoryArray<f64>) -> Vec<f64> {
    let shape = source.shape().to_vec();
    let mirror = |i: i64, n: u64| -> u64 {
        let n = n as i64;
        let i = i.rem_euclid(2 * n);
        (if i < n { i } else { 2 * n - 1 - i }) as u64
    };
    ArraySubset::new_with_shape(shape.clone())
        .iter_indices()
        .map(|i| {
            let mut sum = 0.0;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let y = mirror(i[0] as i64 + dy, shape[0]);
                    let x = mirror(i[1] as i64 + dx, shape[1]);
                    sum += source.elements()[(y * shape[1] + x) as usize];
                }
            }
            sum / 9.0
        })
        .collect()
}

fn mean_filter(
    input: &TransformInput<f64>,
    block: &ArraySubset,
) -> Result<TransformOutput<f64>, ComputationError> {
    let data = block
        .iter_indices()
        .map(|i| {
            let (y, x) = (i[0] as i64, i[1] as i64);
            let mut sum = 0.0;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    sum += input
                        .get(&[y + dy, x + dx])
                        .ok_or_else(|| ComputationError::from("outside the input region"))?;
                }
            }
            Ok(sum / 9.0)
        })
        .collect::<Result<Vec<_>, ComputationError>>()?;
    Ok(TransformOutput::new(block.clone(), data))
}

#[test]
fn block_transform_matches_eager() {
    let source = Arc::new(InMemoryArray::from_fn(vec![7, 9], |i| {
        ((i[0] * 31 + i[1] * 17) % 23) as f64
    }));
    let eager = mean_filter_eager(&source);

    for block_size in [vec![3, 4], vec![1, 1], vec![7, 9], vec![2, 5]] {
        let lazy = BlockTransform::new_symmetric(
            source.clone(),
            vec![1, 1],
            Extension::Mirror,
            mean_filter,
        )
        .unwrap()
        .process(block_size)
        .unwrap();
        for (indices, expected) in ArraySubset::new_with_shape(vec![7, 9])
            .iter_indices()
            .zip(&eager)
        {
            assert!((lazy.get(&indices).unwrap() - expected).abs() < 1e-12);
        }
    }
}

#[test]
fn block_transform_chained() {
    let source = Arc::new(InMemoryArray::from_fn(vec![6, 5], |i| (i[0] * i[1]) as f64));
    let once = InMemoryArray::new(vec![6, 5], mean_filter_eager(&source)).unwrap();
    let twice = mean_filter_eager(&once);

    let first = BlockTransform::new_symmetric(source, vec![1, 1], Extension::Mirror, mean_filter)
        .unwrap()
        .process(vec![4, 2])
        .unwrap();
    let second = BlockTransform::new_symmetric(
        Arc::new(first),
        vec![1, 1],
        Extension::Mirror,
        mean_filter,
    )
    .unwrap()
    .process(vec![3, 3])
    .unwrap();
    let lazy = second
        .retrieve_subset(&ArraySubset::new_with_shape(vec![6, 5]))
        .unwrap();
    for (lazy, eager) in lazy.iter().zip(&twice) {
        assert!((lazy - eager).abs() < 1e-12);
    }
}

#[test]
fn block_transform_failure_is_not_cached() {
    let fail = Arc::new(AtomicBool::new(true));
    let source = Arc::new(InMemoryArray::from_fn(vec![10, 10], |i| (i[0] + i[1]) as u32));
    let transform = {
        let fail = fail.clone();
        BlockTransform::new_symmetric(
            source,
            vec![0, 0],
            Extension::Border,
            move |input: &TransformInput<u32>, block: &ArraySubset| {
                if fail.load(Ordering::SeqCst) && block.contains(&[5, 5]) {
                    return Err(ComputationError::from("transform failed"));
                }
                Ok(TransformOutput::new(block.clone(), input.data().to_vec()))
            },
        )
        .unwrap()
    };
    let array = transform.process(vec![4, 4]).unwrap();

    // the block [4..8, 4..8] fails
    let err = array.get(&[5, 5]).unwrap_err();
    assert!(err.is_computation_failed());
    assert!(matches!(err, ArrayError::ComputationFailed { key: 4, .. }));
    assert!(array.get(&[7, 4]).unwrap_err().is_computation_failed());
    assert_eq!(array.get(&[0, 0]).unwrap(), 0);
    assert!(array.try_get_cell_if_cached(&[1, 1]).unwrap().is_none());

    fail.store(false, Ordering::SeqCst);
    assert_eq!(array.get(&[5, 5]).unwrap(), 10);
    assert_eq!(array.get(&[7, 4]).unwrap(), 11);
}

#[test]
fn cached_cell_array_open_store() {
    let store = Arc::new(MemoryStore::new());
    let attributes =
        DatasetAttributes::new(vec![5, 7], vec![2, 3], DataType::Int32, Compression::Raw);
    store.create_dataset("volume", &attributes).unwrap();
    let elements: Vec<i32> = (0..35).map(|i| i - 17).collect();
    store_array_subset(
        &*store,
        "volume",
        &ArraySubset::new_with_shape(vec![5, 7]),
        bytemuck::cast_slice(&elements),
    )
    .unwrap();

    let array = CachedCellArray::<i32>::open(store, "volume").unwrap();
    assert_eq!(array.shape(), &[5, 7]);
    assert_eq!(array.grid().grid_shape(), &[3, 3]);
    assert_eq!(
        array
            .retrieve_subset(&ArraySubset::new_with_shape(vec![5, 7]))
            .unwrap(),
        elements
    );
    assert_eq!(array.get(&[4, 6]).unwrap(), 17);
}
