//! A filesystem store.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::storage::StorageError;

use super::KeyValueStore;

/// A file system store.
///
/// Each key maps to a file relative to the base directory. Directories are created as needed.
#[derive(Debug)]
pub struct FilesystemStore {
    base_directory: PathBuf,
}

/// A filesystem store creation error.
#[derive(Debug, Error)]
pub enum FilesystemStoreCreateError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The path is not valid on this system.
    #[error("base directory {0} is not valid")]
    InvalidBaseDirectory(PathBuf),
}

impl FilesystemStore {
    /// Create a new file system store at a given `base_path`.
    ///
    /// # Errors
    /// Returns a [`FilesystemStoreCreateError`] if `base_path` is not valid.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, FilesystemStoreCreateError> {
        let base_path = base_path.as_ref().to_path_buf();
        if base_path.to_str().is_none() || (base_path.exists() && !base_path.is_dir()) {
            return Err(FilesystemStoreCreateError::InvalidBaseDirectory(base_path));
        }
        Ok(Self {
            base_directory: base_path,
        })
    }

    /// Return the base directory of the store.
    #[must_use]
    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Maps a store key to a filesystem path.
    fn key_to_fspath(&self, key: &str) -> PathBuf {
        let mut path = self.base_directory.clone();
        path.extend(key.split('/'));
        path
    }
}

impl KeyValueStore for FilesystemStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(self.key_to_fspath(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.key_to_fspath(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, value)?;
        Ok(())
    }
}

super::impl_storage_traits!(FilesystemStore);
