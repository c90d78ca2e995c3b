//! Filesystem abstraction used by the graph builder.
//!
//! Reads go through the `Runtime` trait so the builder can run against the
//! real filesystem ([`NativeRuntime`]) or an in-memory file map
//! ([`MemoryRuntime`]) for embedding and tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::task;

/// Result type for runtime operations
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Other runtime error
    #[error("Runtime error: {0}")]
    Other(String),
}

/// Platform runtime trait
///
/// The existence checks are synchronous; the resolver batches every check for
/// a specifier into one blocking task.
#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    /// Read a file's bytes
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// Check if a path is an existing file
    fn is_file(&self, path: &Path) -> bool;

    /// Check if a path is an existing directory
    fn is_dir(&self, path: &Path) -> bool;
}

/// Native filesystem Runtime implementation using `std::fs`.
///
/// Reads run on tokio's blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = path.to_path_buf();

        task::spawn_blocking(move || {
            std::fs::read(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::FileNotFound(path.clone())
                } else {
                    RuntimeError::Io(format!("Failed to read {}: {}", path.display(), e))
                }
            })
        })
        .await
        .map_err(|e| RuntimeError::Other(format!("Task join error: {}", e)))?
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// In-memory runtime holding absolute paths mapped to file contents.
///
/// Directories are implied by the files below them.
#[derive(Debug, Clone, Default)]
pub struct MemoryRuntime {
    files: Arc<RwLock<FxHashMap<PathBuf, Vec<u8>>>>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.files.write().insert(path.into(), content.into());
    }

    /// Builder-style [`MemoryRuntime::insert`].
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn remove(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.write().remove(path)
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files
            .read()
            .keys()
            .any(|file| file != path && file.starts_with(path))
    }
}
