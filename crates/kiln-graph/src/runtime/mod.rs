//! Platform runtime abstraction.
//!
//! The engine never touches the file system directly. Reading module content
//! and writing artifacts go through [`Runtime`], which keeps the graph and
//! the pipeline testable against an in-memory project.

mod memory;
#[cfg(not(target_family = "wasm"))]
mod native;

pub use memory::MemoryRuntime;
#[cfg(not(target_family = "wasm"))]
pub use native::NativeRuntime;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failure of a file system operation.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Runtime error: {0}")]
    Other(String),
}

impl RuntimeError {
    pub(crate) fn from_io(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            RuntimeError::FileNotFound(path.to_path_buf())
        } else {
            RuntimeError::Io(format!("{}: {}", path.display(), err))
        }
    }
}

/// What the engine needs to know about a path.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub is_dir: bool,
    pub is_file: bool,
    /// Milliseconds since the epoch, when the platform reports it.
    pub modified: Option<u64>,
}

/// Platform runtime trait.
///
/// Content reads are one of the two places the engine suspends; resolution
/// probes (`exists`, `is_file`) are synchronous so graph construction stays
/// on a single logical thread.
#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    /// Whole file content.
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()>;

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata>;

    fn exists(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()>;

    /// Atomically move a file into place
    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()>;

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()>;

    /// Working directory used to resolve relative roots.
    fn get_cwd(&self) -> RuntimeResult<PathBuf>;
}
