//! Snapshot persistence backends.

use crate::error::StoreResult;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};

/// A durable store for one collection snapshot.
///
/// Backends are **opaque byte stores**: the store crate owns all encoding,
/// backends only persist and return the latest snapshot blob.
///
/// # Invariants
///
/// - `load` returns exactly the bytes of the most recent successful `store`
/// - A `store` that fails leaves the previous snapshot readable
/// - Backends must be `Send + Sync` for concurrent access
pub trait SnapshotBackend: Send + Sync {
    /// Returns the latest snapshot, or `None` if nothing was stored yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read.
    fn load(&self) -> StoreResult<Option<Vec<u8>>>;

    /// Replaces the snapshot with `bytes`, durably.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn store(&self, bytes: &[u8]) -> StoreResult<()>;
}

/// An in-memory backend.
///
/// Suitable for tests and ephemeral replicas; nothing survives the
/// process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: RwLock<Option<Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-seeded with a snapshot.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(Some(data)),
        }
    }

    /// Returns a copy of the current snapshot, if any.
    #[must_use]
    pub fn data(&self) -> Option<Vec<u8>> {
        self.data.read().clone()
    }
}

impl SnapshotBackend for MemoryBackend {
    fn load(&self) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.data.read().clone())
    }

    fn store(&self, bytes: &[u8]) -> StoreResult<()> {
        *self.data.write() = Some(bytes.to_vec());
        Ok(())
    }
}

/// A file-backed backend.
///
/// Snapshots are replaced atomically: the new blob is written to a
/// sibling temp file and renamed over the target, so a crash mid-write
/// leaves the previous snapshot intact.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileBackend {
    /// Opens a backend at the given path.
    ///
    /// The file does not need to exist yet; `load` reports `None` until
    /// the first `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            lock: RwLock::new(()),
        })
    }

    /// Returns the path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl SnapshotBackend for FileBackend {
    fn load(&self) -> StoreResult<Option<Vec<u8>>> {
        let _guard = self.lock.read();
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, bytes: &[u8]) -> StoreResult<()> {
        let _guard = self.lock.write();
        let tmp = self.temp_path();
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
