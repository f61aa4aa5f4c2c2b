//! Domain types shared by the pipeline, watcher and reconciler

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label reserved in the IP registry to force change detection.
///
/// Entries with this label are never fetched.
pub const TRIGGER_LABEL: &str = "trigger";

/// Id of the metadata singleton document
pub const LAST_UPDATED_ID: &str = "last_updated";

/// Id of the settings singleton document
pub const SETTINGS_ID: i64 = 1;

/// One of the three lists maintained by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Ip,
    Domain,
    Url,
}

impl ListKind {
    /// All kinds in processing order
    pub const ALL: [ListKind; 3] = [ListKind::Ip, ListKind::Domain, ListKind::Url];

    /// Field holding the value in a result record (also the dedup key)
    pub fn natural_key(self) -> &'static str {
        match self {
            ListKind::Ip => "ip",
            ListKind::Domain => "domain",
            ListKind::Url => "url",
        }
    }

    /// Scheduler job id of the periodic ingestion for this kind
    pub fn job_id(self) -> &'static str {
        match self {
            ListKind::Ip => "fetch_and_store_ips",
            ListKind::Domain => "fetch_and_store_domains",
            ListKind::Url => "fetch_and_store_urls",
        }
    }

    /// Whether `label` is excluded from this kind's fetch set
    pub fn is_reserved_label(self, label: &str) -> bool {
        self == ListKind::Ip && label == TRIGGER_LABEL
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ListKind::Ip => 0,
            ListKind::Domain => 1,
            ListKind::Url => 2,
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListKind::Ip => "IP",
            ListKind::Domain => "domain",
            ListKind::Url => "URL",
        };
        f.write_str(name)
    }
}

/// A registry entry: where to fetch one source of a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Human-readable label, unique per kind
    pub source: String,
    /// Remote URL or local-path alias
    pub url: String,
}

/// One extracted value together with the label of the source it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub value: String,
    pub source: String,
}

impl ResultRecord {
    pub fn new(value: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source: source.into(),
        }
    }

    /// Document shape stored in the kind's result collection
    pub fn to_document(&self, kind: ListKind) -> crate::traits::Document {
        let mut doc = crate::traits::Document::new();
        doc.insert(kind.natural_key().to_string(), self.value.clone().into());
        doc.insert("source".to_string(), self.source.clone().into());
        doc
    }

    /// Read a record back from a stored document
    pub fn from_document(kind: ListKind, doc: &crate::traits::Document) -> Option<Self> {
        let value = doc.get(kind.natural_key())?.as_str()?;
        let source = doc.get("source")?.as_str()?;
        Some(Self::new(value, source))
    }
}

/// Operator-controlled scheduling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Hours between periodic ingestions
    #[serde(default = "default_update_interval")]
    pub update_interval: i64,
    /// Whether the periodic ingestion jobs are scheduled at all
    #[serde(default = "default_enable_automatic_update")]
    pub enable_automatic_update: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
            enable_automatic_update: default_enable_automatic_update(),
        }
    }
}

fn default_update_interval() -> i64 {
    1
}

fn default_enable_automatic_update() -> bool {
    true
}

/// In-memory copy of a registry's `label -> url` mapping.
///
/// Iteration follows store order; equality is map equality, so two
/// snapshots holding the same entries in a different order are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    entries: IndexMap<String, String>,
}

impl RegistrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from registry entries, skipping reserved labels.
    ///
    /// A label appearing twice keeps its last URL.
    pub fn from_entries(kind: ListKind, entries: impl IntoIterator<Item = SourceEntry>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|entry| !kind.is_reserved_label(&entry.source))
            .map(|entry| (entry.source, entry.url))
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries.get(label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(source: &str, url: &str) -> SourceEntry {
        SourceEntry {
            source: source.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_snapshot_excludes_trigger_for_ip_only() {
        let entries = vec![entry("trigger", "x"), entry("a", "http://a")];

        let ip = RegistrySnapshot::from_entries(ListKind::Ip, entries.clone());
        assert_eq!(ip.len(), 1);
        assert!(ip.get("trigger").is_none());

        let domain = RegistrySnapshot::from_entries(ListKind::Domain, entries);
        assert_eq!(domain.len(), 2);
    }

    #[test]
    fn test_snapshot_equality_ignores_order() {
        let a = RegistrySnapshot::from_entries(
            ListKind::Url,
            vec![entry("a", "1"), entry("b", "2")],
        );
        let b = RegistrySnapshot::from_entries(
            ListKind::Url,
            vec![entry("b", "2"), entry("a", "1")],
        );
        assert_eq!(a, b);

        let edited = RegistrySnapshot::from_entries(
            ListKind::Url,
            vec![entry("a", "1"), entry("b", "3")],
        );
        assert_ne!(a, edited);
    }

    #[test]
    fn test_trigger_entry_changes_nothing_in_ip_snapshot() {
        let before = RegistrySnapshot::from_entries(ListKind::Ip, vec![entry("a", "1")]);
        let after = RegistrySnapshot::from_entries(
            ListKind::Ip,
            vec![entry("a", "1"), entry("trigger", "now")],
        );
        assert_eq!(before, after);
    }

    #[test]
    fn test_record_document_shape() {
        let record = ResultRecord::new("1.1.1.1", "A");
        let doc = record.to_document(ListKind::Ip);
        assert_eq!(doc.get("ip").and_then(|v| v.as_str()), Some("1.1.1.1"));
        assert_eq!(doc.get("source").and_then(|v| v.as_str()), Some("A"));
        assert_eq!(ResultRecord::from_document(ListKind::Ip, &doc), Some(record));
    }

    #[test]
    fn test_settings_defaults_when_fields_missing() {
        let settings: Settings = serde_json::from_str(r#"{"_id": 1}"#).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.update_interval, 1);
        assert!(settings.enable_automatic_update);
    }
}
