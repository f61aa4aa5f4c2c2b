// # Document Store Trait
//
// Defines the interface to the persistent document store.
//
// ## Purpose
//
// The store holds everything the engine reads and writes:
// - Source registries (one collection per list kind, operator-edited)
// - Result collections (owned and fully replaced by the pipeline)
// - The `last_updated` metadata singleton
// - The scheduling settings singleton
//
// ## Implementations
//
// - In-memory: `MemoryDocumentStore` (tests, ephemeral deployments)
// - File-based: `FileDocumentStore` (JSON file, atomic rename)
//
// ## Usage
//
// ```rust,ignore
// use listsync_core::traits::{DocumentStore, Filter};
//
// let store = /* DocumentStore implementation */;
// let registry = store.find("ip_urls").await?;
// store.delete_many("ip_addresses", &Filter::All).await?;
// store.insert_many("ip_addresses", docs).await?;
// ```

use async_trait::async_trait;
use serde_json::Value;

/// A stored document: a JSON object, `_id` included once stored
pub type Document = serde_json::Map<String, Value>;

/// Field carrying a document's identity
pub const ID_FIELD: &str = "_id";

/// Selection used by [`DocumentStore::delete_many`]
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document in the collection
    All,
    /// Documents whose `_id` is one of the given values
    IdIn(Vec<Value>),
}

impl Filter {
    /// Whether `doc` is selected by this filter
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::IdIn(ids) => doc.get(ID_FIELD).is_some_and(|id| ids.contains(id)),
        }
    }
}

/// Documents sharing one value of a grouping key
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    /// The shared key value
    pub key: Value,
    /// `_id`s of the members, in store order
    pub ids: Vec<Value>,
}

/// Trait for document store implementations
///
/// Individual calls are atomic; a sequence of calls is not. The pipeline
/// relies on this when it replaces a collection with `delete_many` followed
/// by `insert_many`.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return every document of a collection in store order
    ///
    /// A missing collection is an empty collection.
    async fn find(&self, collection: &str) -> Result<Vec<Document>, crate::Error>;

    /// Return the document with the given `_id`, if any
    async fn find_one(&self, collection: &str, id: &Value)
    -> Result<Option<Document>, crate::Error>;

    /// Append documents, assigning an `_id` to those without one
    async fn insert_many(&self, collection: &str, docs: Vec<Document>)
    -> Result<(), crate::Error>;

    /// Remove the documents selected by `filter`
    ///
    /// # Returns
    ///
    /// The number of documents removed
    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, crate::Error>;

    /// Set `fields` on the document with the given `_id`
    ///
    /// Fields not named in `fields` are left alone. With `upsert`, a
    /// missing document is created; without it, a missing document is
    /// a no-op.
    async fn update_one(
        &self,
        collection: &str,
        id: &Value,
        fields: Document,
        upsert: bool,
    ) -> Result<(), crate::Error>;

    /// Group documents by the value of `key` and return the groups with
    /// more than one member
    ///
    /// Documents without `key` are ignored. Groups come back in the order
    /// their first member appears in the collection.
    async fn group_duplicates(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Vec<DuplicateGroup>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing document stores from configuration
#[async_trait]
pub trait DocumentStoreFactory: Send + Sync {
    /// Create a DocumentStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<std::sync::Arc<dyn DocumentStore>, crate::Error>;
}
