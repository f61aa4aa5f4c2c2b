// # Memory Document Store
//
// In-memory implementation of DocumentStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for deployments where the registries are seeded
// by another process sharing this one.
//
// ## Crash Behavior
//
// - All registries, results and settings are lost on restart
// - Settings fall back to defaults (1 hour, automatic updates on)

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::Database;
use crate::Error;
use crate::config::StoreConfig;
use crate::traits::document_store::{
    Document, DocumentStore, DocumentStoreFactory, DuplicateGroup, Filter,
};

/// In-memory document store implementation
///
/// # Example
///
/// ```rust,no_run
/// use listsync_core::store::MemoryDocumentStore;
/// use listsync_core::traits::DocumentStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryDocumentStore::new();
///
///     let entry = serde_json::json!({"source": "feodo", "url": "https://example.com/ips.txt"});
///     store.insert_many("ip_urls", vec![entry.as_object().cloned().unwrap()]).await?;
///
///     assert_eq!(store.find("ip_urls").await?.len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<Database>>,
}

impl MemoryDocumentStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub async fn len(&self, collection: &str) -> usize {
        self.inner.read().await.len(collection)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(&self, collection: &str) -> Result<Vec<Document>, Error> {
        Ok(self.inner.read().await.find(collection))
    }

    async fn find_one(&self, collection: &str, id: &Value) -> Result<Option<Document>, Error> {
        Ok(self.inner.read().await.find_one(collection, id))
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<(), Error> {
        self.inner.write().await.insert_many(collection, docs);
        Ok(())
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, Error> {
        Ok(self.inner.write().await.delete_many(collection, filter))
    }

    async fn update_one(
        &self,
        collection: &str,
        id: &Value,
        fields: Document,
        upsert: bool,
    ) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .update_one(collection, id, fields, upsert);
        Ok(())
    }

    async fn group_duplicates(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Vec<DuplicateGroup>, Error> {
        Ok(self.inner.read().await.group_duplicates(collection, key))
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store (everything is already "persisted")
        Ok(())
    }
}

/// Factory for the `memory` store type
pub struct MemoryDocumentStoreFactory;

#[async_trait]
impl DocumentStoreFactory for MemoryDocumentStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Arc::new(MemoryDocumentStore::new())),
            _ => Err(Error::config("Invalid config for memory store")),
        }
    }
}
