// # File Document Store
//
// File-based implementation of DocumentStore with crash recovery.
//
// ## Purpose
//
// Persists registries, result lists, metadata and settings across restarts
// without an external database server.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good database
// - Recovery: Falls back to backup if corruption detected
//
// ## External Edits
//
// Operators edit registries and settings from other processes. Every call
// compares the file's mtime and length with those seen at the last load or
// write and reloads the file when they differ. Unwritten local changes
// win over the file.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "database": {
//     "next_id": 2,
//     "collections": {
//       "ip_urls": [{"_id": 1, "source": "feodo", "url": "https://..."}],
//       "ip_addresses": [{"_id": 2, "ip": "1.1.1.1", "source": "feodo"}]
//     }
//   }
// }
// ```

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::Database;
use crate::Error;
use crate::config::StoreConfig;
use crate::traits::document_store::{
    Document, DocumentStore, DocumentStoreFactory, DuplicateGroup, Filter,
};

/// Database file format version
const DATABASE_FILE_VERSION: &str = "1.0";

/// File-based document store with crash recovery
///
/// Every call first picks up changes other processes made to the file.
/// Every mutating call rewrites the file before returning, so a successful
/// `insert_many` or `delete_many` is durable on its own. A crash between the
/// two calls of a collection replace leaves the collection empty on disk
/// until the next successful ingestion.
///
/// # Example
///
/// ```rust,no_run
/// use listsync_core::store::FileDocumentStore;
/// use listsync_core::traits::DocumentStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileDocumentStore::new("/var/lib/listsync/checker.json").await?;
///     let sources = store.find("ip_urls").await?;
///     println!("{} IP sources", sources.len());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileDocumentStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    database: Database,
    dirty: bool,
    /// File as of the last load or write; `None` when there was no file
    seen: Option<FileStamp>,
}

/// What identifies a version of the database file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    async fn of(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).await.ok()?;
        Some(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

/// Serializable database file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct DatabaseFileFormat {
    version: String,
    database: Database,
}

impl FileDocumentStore {
    /// Create or load a file document store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing database file
    /// 3. If corruption detected, try to load from backup
    /// 4. If both fail, start with an empty database
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let seen = FileStamp::of(&path).await;
        let database = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                database,
                dirty: false,
                seen,
            })),
        })
    }

    /// Reload the file if another writer changed it since we last saw it
    async fn refresh(&self) -> Result<(), Error> {
        let current = FileStamp::of(&self.path).await;
        {
            let state = self.state.read().await;
            if state.dirty || state.seen == current {
                return Ok(());
            }
        }

        let mut state = self.state.write().await;
        if state.dirty || state.seen == current {
            return Ok(());
        }
        state.database = Self::load_with_recovery(&self.path).await?;
        // Stamp taken before the load, so a write racing the load is
        // picked up on the next call
        state.seen = current;
        tracing::debug!("Reloaded changed database file {}", self.path.display());
        Ok(())
    }

    /// Load the database, falling back to the backup on corruption
    async fn load_with_recovery(path: &Path) -> Result<Database, Error> {
        let err = match Self::load(path).await {
            Ok(database) => return Ok(database),
            Err(e) => e,
        };

        // Anything other than a parse failure is a real I/O problem
        if !matches!(err, Error::Json(_)) {
            return Err(err);
        }

        tracing::warn!(
            "Database file {} appears corrupted: {}. Attempting recovery from backup.",
            path.display(),
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty database.");
            return Ok(Database::default());
        }

        match Self::load(&backup_path).await {
            Ok(database) => {
                tracing::info!("Recovered database from backup {}", backup_path.display());
                if let Err(restore_err) = fs::copy(&backup_path, path).await {
                    tracing::error!(
                        "Failed to restore database file from backup: {}",
                        restore_err
                    );
                }
                Ok(database)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with empty database.",
                    backup_err
                );
                Ok(Database::default())
            }
        }
    }

    async fn load(path: &Path) -> Result<Database, Error> {
        if !path.exists() {
            tracing::debug!("Database file does not exist: {}", path.display());
            return Ok(Database::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!(
                "Failed to read database file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: DatabaseFileFormat = serde_json::from_str(&content)?;

        if file.version != DATABASE_FILE_VERSION {
            tracing::warn!(
                "Database file version mismatch: expected {}, got {}. Attempting to load anyway.",
                DATABASE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.database)
    }

    /// Write the database to disk atomically
    async fn write(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;

        let file = DatabaseFileFormat {
            version: DATABASE_FILE_VERSION.to_string(),
            database: state.database.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Failed to create backup: {}", e);
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        state.dirty = false;
        state.seen = FileStamp::of(&self.path).await;
        tracing::trace!("Database written to file: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Apply a mutation and write it through
    async fn mutate<T>(&self, apply: impl FnOnce(&mut Database) -> T) -> Result<T, Error> {
        self.refresh().await?;
        let result = {
            let mut state = self.state.write().await;
            let result = apply(&mut state.database);
            state.dirty = true;
            result
        };
        self.write().await?;
        Ok(result)
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn find(&self, collection: &str) -> Result<Vec<Document>, Error> {
        self.refresh().await?;
        Ok(self.state.read().await.database.find(collection))
    }

    async fn find_one(&self, collection: &str, id: &Value) -> Result<Option<Document>, Error> {
        self.refresh().await?;
        Ok(self.state.read().await.database.find_one(collection, id))
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<(), Error> {
        self.mutate(|db| db.insert_many(collection, docs)).await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, Error> {
        self.mutate(|db| db.delete_many(collection, filter)).await
    }

    async fn update_one(
        &self,
        collection: &str,
        id: &Value,
        fields: Document,
        upsert: bool,
    ) -> Result<(), Error> {
        self.mutate(|db| {
            db.update_one(collection, id, fields, upsert);
        })
        .await
    }

    async fn group_duplicates(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Vec<DuplicateGroup>, Error> {
        self.refresh().await?;
        Ok(self
            .state
            .read()
            .await
            .database
            .group_duplicates(collection, key))
    }

    async fn flush(&self) -> Result<(), Error> {
        if self.state.read().await.dirty {
            self.write().await
        } else {
            Ok(())
        }
    }
}

/// Factory for the `file` store type
pub struct FileDocumentStoreFactory;

#[async_trait]
impl DocumentStoreFactory for FileDocumentStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, Error> {
        match config {
            StoreConfig::File { path, database } => {
                let file = Path::new(path).join(format!("{}.json", database));
                Ok(Arc::new(FileDocumentStore::new(file).await?))
            }
            _ => Err(Error::config("Invalid config for file store")),
        }
    }
}
