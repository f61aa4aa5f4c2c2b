//! Configuration types for the listsync engine
//!
//! This module defines all configuration structures used throughout the crate.

use crate::model::ListKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Main listsync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Document store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Downstream cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Collection names
    #[serde(default)]
    pub collections: Collections,

    /// Source fetching
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Value extraction policy
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Watcher and reconciler timing
    #[serde(default)]
    pub engine: EngineConfig,
}

impl UpdaterConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.cache.validate()?;
        self.collections.validate()?;
        self.fetch.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Document store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON file per database under `path`
    File {
        /// Directory holding the database file
        path: String,
        /// Database name; the file is `<path>/<database>.json`
        database: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path, database } => {
                if path.is_empty() {
                    return Err(crate::Error::config("File store path cannot be empty"));
                }
                if database.is_empty() {
                    return Err(crate::Error::config("Database name cannot be empty"));
                }
                if database.contains(['/', '\\']) || database == ".." {
                    return Err(crate::Error::config(format!(
                        "Database name must be a plain name, got: {}",
                        database
                    )));
                }
                Ok(())
            }
            StoreConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom store factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Downstream cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheConfig {
    /// In-process cache
    #[default]
    Memory,

    /// Redis database shared with the list readers; flushed with FLUSHDB
    Redis {
        /// Connection URL, e.g. `redis://127.0.0.1:6379/0`
        url: String,
    },

    /// Custom cache
    Custom {
        factory: String,
        config: serde_json::Value,
    },
}

impl CacheConfig {
    /// Validate the cache configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            CacheConfig::Redis { url } if url.is_empty() => {
                Err(crate::Error::config("Redis URL cannot be empty"))
            }
            CacheConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom cache factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the cache type name
    pub fn type_name(&self) -> &str {
        match self {
            CacheConfig::Memory => "memory",
            CacheConfig::Redis { .. } => "redis",
            CacheConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Names of every collection the engine touches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collections {
    pub ip: String,
    pub domain: String,
    pub url: String,
    pub metadata: String,
    pub ip_sources: String,
    pub domain_sources: String,
    pub url_sources: String,
    pub settings: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            ip: "ip_addresses".to_string(),
            domain: "domains".to_string(),
            url: "urls".to_string(),
            metadata: "metadata".to_string(),
            ip_sources: "ip_urls".to_string(),
            domain_sources: "domain_urls".to_string(),
            url_sources: "url_urls".to_string(),
            settings: "settings".to_string(),
        }
    }
}

impl Collections {
    /// Result collection of a kind
    pub fn results(&self, kind: ListKind) -> &str {
        match kind {
            ListKind::Ip => &self.ip,
            ListKind::Domain => &self.domain,
            ListKind::Url => &self.url,
        }
    }

    /// Source registry collection of a kind
    pub fn registry(&self, kind: ListKind) -> &str {
        match kind {
            ListKind::Ip => &self.ip_sources,
            ListKind::Domain => &self.domain_sources,
            ListKind::Url => &self.url_sources,
        }
    }

    fn all(&self) -> [(&'static str, &str); 8] {
        [
            ("ip", self.ip.as_str()),
            ("domain", self.domain.as_str()),
            ("url", self.url.as_str()),
            ("metadata", self.metadata.as_str()),
            ("ip_sources", self.ip_sources.as_str()),
            ("domain_sources", self.domain_sources.as_str()),
            ("url_sources", self.url_sources.as_str()),
            ("settings", self.settings.as_str()),
        ]
    }

    /// Validate that every name is set and no two collections share a name
    pub fn validate(&self) -> Result<(), crate::Error> {
        let mut seen = HashSet::new();
        for (role, name) in self.all() {
            if name.is_empty() {
                return Err(crate::Error::config(format!(
                    "Collection name for {} cannot be empty",
                    role
                )));
            }
            if !seen.insert(name) {
                return Err(crate::Error::config(format!(
                    "Collection name '{}' is used more than once",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Source fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Transport used for remote sources
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Hosts treated as this machine
    #[serde(default = "default_local_hosts")]
    pub local_hosts: Vec<String>,

    /// Port of the local file service; only URLs on this port are local
    #[serde(default = "default_local_port")]
    pub local_port: u16,

    /// Directory local aliases resolve against
    #[serde(default = "default_local_root")]
    pub local_root: String,

    /// Per-request timeout of the transport (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            local_hosts: default_local_hosts(),
            local_port: default_local_port(),
            local_root: default_local_root(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl FetchConfig {
    /// Validate the fetch configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.transport.is_empty() {
            return Err(crate::Error::config("Transport type cannot be empty"));
        }
        if self.local_port == 0 {
            return Err(crate::Error::config("Local port must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Fetch timeout must be > 0"));
        }
        Ok(())
    }
}

fn default_transport() -> String {
    "http".to_string()
}

fn default_local_hosts() -> Vec<String> {
    vec!["localhost".to_string(), "127.0.0.1".to_string()]
}

fn default_local_port() -> u16 {
    8000
}

fn default_local_root() -> String {
    ".".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Value extraction policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Keep only globally routable IP addresses
    #[serde(default = "default_global_ips_only")]
    pub global_ips_only: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            global_ips_only: default_global_ips_only(),
        }
    }
}

fn default_global_ips_only() -> bool {
    true
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Idle delay between two registry polls (in milliseconds)
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,

    /// Interval of the settings reconciliation job (in seconds)
    #[serde(default = "default_settings_poll_secs")]
    pub settings_poll_secs: u64,

    /// Capacity of the watcher's event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            watch_interval_ms: default_watch_interval_ms(),
            settings_poll_secs: default_settings_poll_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.watch_interval_ms == 0 {
            return Err(crate::Error::config("Watch interval must be > 0"));
        }
        if self.settings_poll_secs == 0 {
            return Err(crate::Error::config("Settings poll interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

fn default_watch_interval_ms() -> u64 {
    1000
}

fn default_settings_poll_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(UpdaterConfig::new().validate().is_ok());
    }

    #[test]
    fn test_duplicate_collection_names_rejected() {
        let mut config = UpdaterConfig::new();
        config.collections.url = config.collections.domain.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut config = UpdaterConfig::new();
        config.engine.watch_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = UpdaterConfig::new();
        config.fetch.local_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_store_requires_plain_database_name() {
        let store = StoreConfig::File {
            path: "/var/lib/listsync".to_string(),
            database: "../etc".to_string(),
        };
        assert!(store.validate().is_err());
    }

    #[test]
    fn test_redis_cache_config() {
        let config: UpdaterConfig =
            serde_json::from_str(r#"{"cache": {"type": "redis", "url": "redis://cache:6379/0"}}"#)
                .unwrap();
        assert_eq!(config.cache.type_name(), "redis");
        assert!(config.validate().is_ok());

        let mut config = UpdaterConfig::new();
        config.cache = CacheConfig::Redis { url: String::new() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: UpdaterConfig =
            serde_json::from_str(r#"{"store": {"type": "memory"}, "engine": {"watch_interval_ms": 50}}"#)
                .unwrap();
        assert_eq!(config.engine.watch_interval_ms, 50);
        assert_eq!(config.engine.settings_poll_secs, 10);
        assert_eq!(config.collections.registry(ListKind::Ip), "ip_urls");
        assert!(config.extraction.global_ips_only);
    }
}
