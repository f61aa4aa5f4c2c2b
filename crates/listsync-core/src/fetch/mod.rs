//! Source fetching
//!
//! [`SourceFetcher`] turns a registry URL into lines of text. URLs pointing
//! at the local file service (a configured host set plus the service port)
//! are served from disk under `local_root`; everything else goes through
//! the [`Transport`].

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::traits::Transport;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

/// Where a source URL resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// File relative to the local root
    Local(PathBuf),
    /// Remote URL, fetched as-is
    Remote(String),
}

/// Resolves and fetches source content
pub struct SourceFetcher {
    transport: Arc<dyn Transport>,
    local_hosts: Vec<String>,
    local_port: u16,
    local_root: PathBuf,
}

impl SourceFetcher {
    /// Create a fetcher
    ///
    /// # Parameters
    ///
    /// - `transport`: used for every non-local source
    /// - `config`: local alias hosts, port and root directory
    pub fn new(transport: Arc<dyn Transport>, config: &FetchConfig) -> Self {
        Self {
            transport,
            local_hosts: config
                .local_hosts
                .iter()
                .map(|host| host.to_ascii_lowercase())
                .collect(),
            local_port: config.local_port,
            local_root: PathBuf::from(&config.local_root),
        }
    }

    /// Decide whether `url` is a local alias or a remote source
    pub fn resolve(&self, url: &str) -> SourceLocation {
        let Ok(parsed) = url::Url::parse(url) else {
            return SourceLocation::Remote(url.to_string());
        };

        let is_local = parsed
            .host_str()
            .is_some_and(|host| self.local_hosts.iter().any(|h| h == host))
            && parsed.port_or_known_default() == Some(self.local_port);

        if !is_local {
            return SourceLocation::Remote(url.to_string());
        }

        let relative = parsed.path().trim_start_matches('/');
        SourceLocation::Local(PathBuf::from(relative))
    }

    /// Fetch a source as lines
    ///
    /// # Returns
    ///
    /// - `Ok(lines)`: content split into lines; an unreadable local file
    ///   yields no lines
    /// - `Err(Error::Fetch)`: the remote fetch failed
    pub async fn fetch_lines(&self, url: &str) -> Result<Vec<String>> {
        match self.resolve(url) {
            SourceLocation::Local(relative) => Ok(self.read_local(&relative).await),
            SourceLocation::Remote(remote) => {
                debug!("Fetching {} via {}", remote, self.transport.name());
                let body = self.transport.get_text(&remote).await.map_err(|e| match e {
                    Error::Fetch(_) => e,
                    other => Error::fetch(format!("{}: {}", remote, other)),
                })?;
                Ok(body.lines().map(str::to_string).collect())
            }
        }
    }

    async fn read_local(&self, relative: &Path) -> Vec<String> {
        let path = match self.scoped_path(relative) {
            Ok(path) => path,
            Err(e) => {
                error!("Refusing local source {}: {}", relative.display(), e);
                return Vec::new();
            }
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(e) => {
                error!("Failed to read local file {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    /// Join `relative` onto the local root, refusing anything that could
    /// leave it
    fn scoped_path(&self, relative: &Path) -> Result<PathBuf> {
        if relative.as_os_str().is_empty() {
            return Err(Error::invalid_input("empty local path"));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(Error::invalid_input(format!(
                        "path escapes local root: {}",
                        relative.display()
                    )));
                }
            }
        }
        Ok(self.local_root.join(relative))
    }
}
