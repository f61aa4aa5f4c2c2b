// # Transport Trait
//
// Remote fetch primitive used by `SourceFetcher` for every source that is
// not a local alias.
//
// ## Implementations
//
// - HTTP: `listsync-http` crate (reqwest)
//
// ## Contract
//
// - One GET per call, no retry
// - Any transport failure or non-2xx status is an `Error::Fetch`
// - The body is returned as text; splitting into lines is the caller's job

use async_trait::async_trait;

/// Trait for remote fetch implementations
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the body at `url` as text
    async fn get_text(&self, url: &str) -> Result<String, crate::Error>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Helper trait for constructing transports from configuration
pub trait TransportFactory: Send + Sync {
    fn create(
        &self,
        config: &crate::config::FetchConfig,
    ) -> Result<std::sync::Arc<dyn Transport>, crate::Error>;
}
