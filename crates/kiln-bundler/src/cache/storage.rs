//! redb-backed cache storage.
//!
//! Provides persistent key-value storage using redb, an embedded ACID database.
//! The cache uses a single database file; every write is one transaction.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{BuildCache, CACHE_FORMAT_VERSION, CacheEntry, CacheKey, CacheResult};

/// Cache table: maps rendered cache keys to bincode-encoded entries.
const CACHE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("cache");

/// Metadata table: stores cache-wide metadata.
const METADATA_TABLE: TableDefinition<&str, &str> = TableDefinition::new("metadata");

/// Error types for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Cache entry not found.
    #[error("cache miss")]
    CacheMiss,

    /// The backend was closed.
    #[error("cache is closed")]
    Closed,

    /// Cache database error.
    #[error("cache database error: {0}")]
    DatabaseError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// IO error.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Cache version mismatch.
    #[error("cache version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

impl CacheError {
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::CacheMiss)
    }
}

impl From<redb::Error> for CacheError {
    fn from(err: redb::Error) -> Self {
        CacheError::DatabaseError(err.to_string())
    }
}

impl From<redb::DatabaseError> for CacheError {
    fn from(err: redb::DatabaseError) -> Self {
        CacheError::DatabaseError(err.to_string())
    }
}

impl From<redb::TableError> for CacheError {
    fn from(err: redb::TableError) -> Self {
        CacheError::DatabaseError(err.to_string())
    }
}

impl From<redb::TransactionError> for CacheError {
    fn from(err: redb::TransactionError) -> Self {
        CacheError::DatabaseError(err.to_string())
    }
}

impl From<redb::StorageError> for CacheError {
    fn from(err: redb::StorageError) -> Self {
        CacheError::DatabaseError(err.to_string())
    }
}

impl From<redb::CommitError> for CacheError {
    fn from(err: redb::CommitError) -> Self {
        CacheError::DatabaseError(err.to_string())
    }
}

/// Persistent cache backend using redb.
pub struct RedbCache {
    path: PathBuf,
    db: RwLock<Option<Database>>,
}

impl std::fmt::Debug for RedbCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbCache")
            .field("path", &self.path)
            .field("open", &self.db.read().is_some())
            .finish()
    }
}

impl RedbCache {
    /// Open or create a cache at the given directory.
    ///
    /// Creates the directory and database file if they don't exist.
    /// The database file is stored at `<cache_dir>/cache.redb`.
    pub fn open(cache_dir: &Path) -> CacheResult<Self> {
        std::fs::create_dir_all(cache_dir)?;

        let path = cache_dir.join("cache.redb");
        let db = Database::create(&path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CACHE_TABLE)?;
            let mut metadata = write_txn.open_table(METADATA_TABLE)?;
            metadata.insert("format_version", CACHE_FORMAT_VERSION.to_string().as_str())?;
        }
        write_txn.commit()?;

        tracing::debug!(path = %path.display(), "opened build cache");
        Ok(Self {
            path,
            db: RwLock::new(Some(db)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored entries.
    pub fn len(&self) -> CacheResult<usize> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(CacheError::Closed)?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(CACHE_TABLE)?;
        Ok(table.iter()?.count())
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Get a metadata value.
    pub fn get_metadata(&self, key: &str) -> CacheResult<Option<String>> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(CacheError::Closed)?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(METADATA_TABLE)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    fn read_raw(db: &Database, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(CACHE_TABLE)?;
        Ok(table.get(key)?.map(|value| value.value().to_vec()))
    }
}

impl BuildCache for RedbCache {
    fn get(&self, key: &CacheKey) -> CacheResult<CacheEntry> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(CacheError::Closed)?;

        let bytes = Self::read_raw(db, &key.to_string())?.ok_or(CacheError::CacheMiss)?;
        let entry: CacheEntry = bincode::deserialize(&bytes)
            .map_err(|e| CacheError::DeserializationError(e.to_string()))?;

        if !entry.is_compatible() {
            return Err(CacheError::VersionMismatch {
                expected: CACHE_FORMAT_VERSION,
                found: entry.format_version,
            });
        }

        Ok(entry)
    }

    fn set(&self, entry: CacheEntry) -> CacheResult<()> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(CacheError::Closed)?;

        // identical payloads are already stored; keep the original timestamp
        if let Some(existing) = Self::read_raw(db, &entry.key)? {
            if let Ok(existing) = bincode::deserialize::<CacheEntry>(&existing) {
                if existing.same_payload(&entry) {
                    return Ok(());
                }
            }
        }

        let bytes =
            bincode::serialize(&entry).map_err(|e| CacheError::SerializationError(e.to_string()))?;

        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(CACHE_TABLE)?;
            table.insert(entry.key.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(CacheError::Closed)?;

        let write_txn = db.begin_write()?;
        {
            // Drop and recreate the table to clear it
            write_txn.delete_table(CACHE_TABLE)?;
            let _ = write_txn.open_table(CACHE_TABLE)?;
        }
        write_txn.commit()?;

        Ok(())
    }

    fn close(&self) -> CacheResult<()> {
        if self.db.write().take().is_some() {
            tracing::debug!(path = %self.path.display(), "closed build cache");
        }
        Ok(())
    }
}
