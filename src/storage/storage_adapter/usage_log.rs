//! A storage adapter which logs storage method calls.

use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use crate::storage::{
    DatasetAttributes, ReadableStorageTraits, ReadableWritableStorageTraits, StorageError,
    WritableStorageTraits,
};

/// The usage log storage adapter. Logs storage method calls.
///
/// It is intended to aid in debugging and optimising performance by revealing storage access patterns,
/// such as how often each block is read during a rechunk.
///
/// ### Example (log to stdout)
/// ```rust
/// # use std::sync::{Arc, Mutex};
/// # use lazychunk::storage::{store::MemoryStore, storage_adapter::UsageLogStorageAdapter, ReadableWritableStorage};
/// let store = Arc::new(MemoryStore::new());
/// let log_writer = Arc::new(Mutex::new(
///     // std::io::BufWriter::new(
///     std::io::stdout(),
///     //    )
/// ));
/// let store: ReadableWritableStorage = Arc::new(UsageLogStorageAdapter::new(store, log_writer, || {
///     chrono::Utc::now().format("[%T%.3f] ").to_string()
/// }));
/// ```
///
/// Reading and writing through the above adapter prints outputs like:
/// ```text
/// [23:41:19.885] create_dataset(volume, [100, 100] / [25, 25]) -> Ok(())
/// [23:41:19.885] write_block(volume, [0, 0], len=1250) -> Ok(())
/// [23:41:19.886] dataset_attributes(volume) -> Ok(true)
/// [23:41:19.887] read_block(volume, [0, 0]) -> len=Ok(Some(1250))
/// [23:41:19.887] read_block(volume, [0, 1]) -> len=Ok(None)
/// ```
pub struct UsageLogStorageAdapter<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    handle: Arc<Mutex<dyn Write + Send + Sync>>,
    prefix_func: fn() -> String,
}

impl<TStorage: ?Sized> core::fmt::Debug for UsageLogStorageAdapter<TStorage> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        writeln!(f, "usage log")
    }
}

impl<TStorage: ?Sized> UsageLogStorageAdapter<TStorage> {
    /// Create a new usage log storage adapter of `storage`.
    ///
    /// Each storage method call writes one line to `handle`, starting with the output of `prefix_func`.
    pub fn new(
        storage: Arc<TStorage>,
        handle: Arc<Mutex<dyn Write + Send + Sync>>,
        prefix_func: fn() -> String,
    ) -> Self {
        Self {
            storage,
            handle,
            prefix_func,
        }
    }

    fn log(&self, message: std::fmt::Arguments) -> Result<(), StorageError> {
        let mut handle = self
            .handle
            .lock()
            .map_err(|_| StorageError::from("usage log handle is poisoned"))?;
        writeln!(handle, "{}{message}", (self.prefix_func)())?;
        Ok(())
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits> ReadableStorageTraits
    for UsageLogStorageAdapter<TStorage>
{
    fn dataset_attributes(&self, name: &str) -> Result<DatasetAttributes, StorageError> {
        let result = self.storage.dataset_attributes(name);
        self.log(format_args!(
            "dataset_attributes({name}) -> {:?}",
            result.as_ref().map(|_| true)
        ))?;
        result
    }

    fn read_block(&self, name: &str, grid_coord: &[u64]) -> Result<Option<Vec<u8>>, StorageError> {
        let result = self.storage.read_block(name, grid_coord);
        self.log(format_args!(
            "read_block({name}, {grid_coord:?}) -> len={:?}",
            result.as_ref().map(|bytes| bytes.as_ref().map(Vec::len))
        ))?;
        result
    }
}

impl<TStorage: ?Sized + WritableStorageTraits> WritableStorageTraits
    for UsageLogStorageAdapter<TStorage>
{
    fn create_dataset(
        &self,
        name: &str,
        attributes: &DatasetAttributes,
    ) -> Result<(), StorageError> {
        let result = self.storage.create_dataset(name, attributes);
        self.log(format_args!(
            "create_dataset({name}, {:?} / {:?}) -> {:?}",
            attributes.dimensions(),
            attributes.block_size(),
            result.as_ref().map(|_| ())
        ))?;
        result
    }

    fn write_block(
        &self,
        name: &str,
        grid_coord: &[u64],
        bytes: &[u8],
    ) -> Result<(), StorageError> {
        let result = self.storage.write_block(name, grid_coord, bytes);
        self.log(format_args!(
            "write_block({name}, {grid_coord:?}, len={}) -> {:?}",
            bytes.len(),
            result.as_ref().map(|_| ())
        ))?;
        result
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits>
    ReadableWritableStorageTraits for UsageLogStorageAdapter<TStorage>
{
}

#[cfg(test)]
mod tests {
    use crate::{
        array::DataType,
        storage::{store::MemoryStore, Compression},
    };

    use super::*;

    #[test]
    fn usage_log() {
        let log_writer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let store = UsageLogStorageAdapter::new(
            Arc::new(MemoryStore::new()),
            log_writer.clone(),
            || "[log] ".to_string(),
        );
        let attributes =
            DatasetAttributes::new(vec![4], vec![2], DataType::UInt8, Compression::Raw);
        store.create_dataset("volume", &attributes).unwrap();
        store.write_block("volume", &[1], &[1, 2]).unwrap();
        assert_eq!(store.read_block("volume", &[1]).unwrap(), Some(vec![1, 2]));
        assert!(store.read_block("missing", &[0]).is_err());

        let log = String::from_utf8(log_writer.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(
            lines,
            vec![
                "[log] create_dataset(volume, [4] / [2]) -> Ok(())",
                "[log] write_block(volume, [1], len=2) -> Ok(())",
                "[log] read_block(volume, [1]) -> len=Ok(Some(2))",
                r#"[log] read_block(missing, [0]) -> len=Err(DatasetNotFound("missing"))"#,
            ]
        );
    }
}
