// # Cache Implementations

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::config::CacheConfig;
use crate::traits::cache::{Cache, CacheFactory};

/// In-process key/value cache
///
/// Readers in the same process share it through clones; the engine only
/// ever flushes it.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
    flushes: Arc<AtomicUsize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().await.insert(key.into(), value.into());
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Number of times the cache was flushed
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn flush_all(&self) -> Result<(), Error> {
        self.entries.write().await.clear();
        self.flushes.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Cache flushed");
        Ok(())
    }
}

/// Factory for the `memory` cache type
pub struct MemoryCacheFactory;

impl CacheFactory for MemoryCacheFactory {
    fn create(&self, config: &CacheConfig) -> Result<Arc<dyn Cache>, Error> {
        match config {
            CacheConfig::Memory => Ok(Arc::new(MemoryCache::new())),
            _ => Err(Error::config("Invalid config for memory cache")),
        }
    }
}
