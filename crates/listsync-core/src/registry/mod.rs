//! Plugin-based backend registry
//!
//! The registry maps backend type names to factories so the daemon builds
//! its store, cache and transport from configuration instead of a
//! hardcoded match.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use listsync_core::registry::BackendRegistry;
//! use listsync_core::config::StoreConfig;
//!
//! let registry = BackendRegistry::with_builtins();
//! listsync_http::register(&registry);
//! listsync_redis::register(&registry);
//!
//! let store = registry.create_store(&StoreConfig::Memory).await?;
//! let transport = registry.create_transport(&config.fetch)?;
//! ```
//!
//! ## Registration
//!
//! Backend crates register themselves during initialization:
//!
//! ```rust,ignore
//! // In listsync-http
//! pub fn register(registry: &BackendRegistry) {
//!     registry.register_transport("http", Box::new(HttpTransportFactory));
//! }
//! ```

use crate::cache::MemoryCacheFactory;
use crate::config::{CacheConfig, FetchConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::store::{FileDocumentStoreFactory, MemoryDocumentStoreFactory};
use crate::traits::{Cache, CacheFactory, DocumentStore, DocumentStoreFactory};
use crate::traits::{Transport, TransportFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Registry of store, cache and transport factories
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent reads, exclusive writes.
#[derive(Default)]
pub struct BackendRegistry {
    stores: RwLock<HashMap<String, Arc<dyn DocumentStoreFactory>>>,
    caches: RwLock<HashMap<String, Box<dyn CacheFactory>>>,
    transports: RwLock<HashMap<String, Box<dyn TransportFactory>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the backends shipped in this crate
    ///
    /// - stores: `memory`, `file`
    /// - caches: `memory`
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemoryDocumentStoreFactory));
        registry.register_store("file", Box::new(FileDocumentStoreFactory));
        registry.register_cache("memory", Box::new(MemoryCacheFactory));
        registry
    }

    /// Register a document store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn DocumentStoreFactory>) {
        write(&self.stores).insert(name.into(), Arc::from(factory));
    }

    /// Register a cache factory
    pub fn register_cache(&self, name: impl Into<String>, factory: Box<dyn CacheFactory>) {
        write(&self.caches).insert(name.into(), factory);
    }

    /// Register a transport factory
    pub fn register_transport(&self, name: impl Into<String>, factory: Box<dyn TransportFactory>) {
        write(&self.transports).insert(name.into(), factory);
    }

    /// Create a document store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn DocumentStore>)`: Created store
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
        let store_type = config.type_name();

        let factory = read(&self.stores)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?;

        // Lock released before the async create
        factory.create(config).await
    }

    /// Create a cache from configuration
    pub fn create_cache(&self, config: &CacheConfig) -> Result<Arc<dyn Cache>> {
        let cache_type = config.type_name();
        let caches = read(&self.caches);

        let factory = caches
            .get(cache_type)
            .ok_or_else(|| Error::config(format!("Unknown cache type: {}", cache_type)))?;

        factory.create(config)
    }

    /// Create a transport from configuration
    pub fn create_transport(&self, config: &FetchConfig) -> Result<Arc<dyn Transport>> {
        let transports = read(&self.transports);

        let factory = transports.get(&config.transport).ok_or_else(|| {
            Error::config(format!("Unknown transport type: {}", config.transport))
        })?;

        factory.create(config)
    }

    /// List registered store types, sorted
    pub fn list_stores(&self) -> Vec<String> {
        sorted_keys(&read(&self.stores))
    }

    /// List registered cache types, sorted
    pub fn list_caches(&self) -> Vec<String> {
        sorted_keys(&read(&self.caches))
    }

    /// List registered transport types, sorted
    pub fn list_transports(&self) -> Vec<String> {
        sorted_keys(&read(&self.transports))
    }

    pub fn has_store(&self, name: &str) -> bool {
        read(&self.stores).contains_key(name)
    }

    pub fn has_cache(&self, name: &str) -> bool {
        read(&self.caches).contains_key(name)
    }

    pub fn has_transport(&self, name: &str) -> bool {
        read(&self.transports).contains_key(name)
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}
