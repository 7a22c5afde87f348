use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};
use crate::path::normalize_path_from;

/// In-memory file system keyed by normalized path.
///
/// Used for projects assembled in memory and throughout the test suites.
#[derive(Debug)]
pub struct MemoryRuntime {
    cwd: PathBuf,
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl Default for MemoryRuntime {
    fn default() -> Self {
        Self::new("/")
    }
}

impl MemoryRuntime {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            files: RwLock::new(BTreeMap::new()),
        }
    }

    /// Builder-style file insertion.
    pub fn with_file(self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let key = self.key(path.as_ref());
        self.files.write().insert(key, content.into());
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        let key = self.key(path.as_ref());
        self.files.write().remove(&key).is_some()
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }

    fn key(&self, path: &Path) -> String {
        normalize_path_from(&self.cwd, path)
    }

    fn is_dir_key(&self, key: &str) -> bool {
        let prefix = if key.ends_with('/') {
            key.to_string()
        } else {
            format!("{key}/")
        };
        self.files
            .read()
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.files
            .read()
            .get(&self.key(path))
            .cloned()
            .ok_or_else(|| RuntimeError::FileNotFound(path.to_path_buf()))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        self.insert(path, content.to_vec());
        Ok(())
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let key = self.key(path);
        if let Some(content) = self.files.read().get(&key) {
            return Ok(FileMetadata {
                size: content.len() as u64,
                is_dir: false,
                is_file: true,
                modified: None,
            });
        }
        if self.is_dir_key(&key) {
            return Ok(FileMetadata {
                size: 0,
                is_dir: true,
                is_file: false,
                modified: None,
            });
        }
        Err(RuntimeError::FileNotFound(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        let key = self.key(path);
        let is_file = self.files.read().contains_key(&key);
        is_file || self.is_dir_key(&key)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.read().contains_key(&self.key(path))
    }

    async fn create_dir(&self, _path: &Path, _recursive: bool) -> RuntimeResult<()> {
        // directories are implied by file keys
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()> {
        let content = self
            .files
            .write()
            .remove(&self.key(from))
            .ok_or_else(|| RuntimeError::FileNotFound(from.to_path_buf()))?;
        self.insert(to, content);
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        if self.remove(path) {
            Ok(())
        } else {
            Err(RuntimeError::FileNotFound(path.to_path_buf()))
        }
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self.cwd.clone())
    }
}
