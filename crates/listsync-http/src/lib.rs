// # HTTP Transport
//
// This crate provides the HTTP transport used by listsync to fetch remote
// sources.
//
// ## Contract
//
// - One GET per fetch, no retry; the next watcher poll or scheduled run
//   is the retry
// - Requests time out after `FetchConfig::timeout_secs`
// - Connection failures and non-2xx responses are `Error::Fetch`

use listsync_core::config::FetchConfig;
use listsync_core::registry::BackendRegistry;
use listsync_core::traits::{Transport, TransportFactory};
use listsync_core::{Error, Result};

use std::sync::Arc;
use std::time::Duration;

/// User agent sent with every request
const USER_AGENT: &str = concat!("listsync/", env!("CARGO_PKG_VERSION"));

/// HTTP transport backed by reqwest
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(format!("{} returned HTTP {}", url, status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::fetch(format!("Failed to read body from {}: {}", url, e)))?;

        tracing::debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Factory for the `http` transport type
pub struct HttpTransportFactory;

impl TransportFactory for HttpTransportFactory {
    fn create(&self, config: &FetchConfig) -> Result<Arc<dyn Transport>> {
        if config.transport != "http" {
            return Err(Error::config("Invalid config for HTTP transport"));
        }
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Arc::new(HttpTransport::new(timeout)?))
    }
}

/// Register the HTTP transport with a registry
pub fn register(registry: &BackendRegistry) {
    registry.register_transport("http", Box::new(HttpTransportFactory));
}
