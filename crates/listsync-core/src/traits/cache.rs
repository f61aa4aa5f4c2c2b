// # Cache Trait
//
// Downstream readers keep a volatile cache of lookups against the lists.
// The engine only ever invalidates it as a whole: the cache has no notion
// of list kinds, so any replaced list makes every entry suspect.

use async_trait::async_trait;

/// Trait for the downstream cache
#[async_trait]
pub trait Cache: Send + Sync {
    /// Drop every cached entry
    async fn flush_all(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing caches from configuration
pub trait CacheFactory: Send + Sync {
    fn create(
        &self,
        config: &crate::config::CacheConfig,
    ) -> Result<std::sync::Arc<dyn Cache>, crate::Error>;
}
