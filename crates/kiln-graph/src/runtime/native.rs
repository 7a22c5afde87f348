use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

/// Runtime backed by the local file system through tokio.
#[derive(Debug, Clone, Default)]
pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| RuntimeError::from_io(path, e))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        tokio::fs::write(path, content)
            .await
            .map_err(|e| RuntimeError::from_io(path, e))
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| RuntimeError::from_io(path, e))?;

        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64);

        Ok(FileMetadata {
            size: meta.len(),
            is_dir: meta.is_dir(),
            is_file: meta.is_file(),
            modified,
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        let result = if recursive {
            tokio::fs::create_dir_all(path).await
        } else {
            tokio::fs::create_dir(path).await
        };
        result.map_err(|e| RuntimeError::from_io(path, e))
    }

    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()> {
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| RuntimeError::from_io(from, e))
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| RuntimeError::from_io(path, e))
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        std::env::current_dir().map_err(|e| RuntimeError::Io(e.to_string()))
    }
}
