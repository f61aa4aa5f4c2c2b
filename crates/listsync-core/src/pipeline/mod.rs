//! Ingestion pipeline
//!
//! One generic pipeline serves all three list kinds:
//!
//! ```text
//! registry ──► SourceFetcher ──► Extractor ──► first-seen dedup
//!                                                    │
//!          ┌─────────────────────────────────────────┘
//!          ▼
//!   replace collection ──► stamp metadata ──► flush cache ──► Deduplicator
//! ```
//!
//! ## Replace semantics
//!
//! A run that extracts nothing (every source failed or was empty) leaves
//! the stored collection and the metadata timestamp alone. Otherwise the
//! collection is cleared and rewritten in full.
//!
//! ## Overlapping runs
//!
//! The watcher and the scheduler may start runs of the same kind at the
//! same time. Every run takes a generation number when it starts; when it
//! is ready to replace, it does so only if no newer run of that kind has
//! started in the meantime. Replaces of one kind are serialized.

use crate::config::{Collections, ExtractionConfig};
use crate::dedup::Deduplicator;
use crate::error::{Error, Result};
use crate::extract::{Extractor, extractor_for};
use crate::fetch::SourceFetcher;
use crate::model::{LAST_UPDATED_ID, ListKind, RegistrySnapshot, ResultRecord, SourceEntry};
use crate::traits::{Cache, Document, DocumentStore, Filter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionOutcome {
    /// The collection was replaced
    Replaced,
    /// Nothing was extracted; the collection was left untouched
    Unchanged,
    /// A newer run of the same kind started first; results discarded
    Superseded,
}

/// Summary of one ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub kind: ListKind,
    pub generation: u64,
    /// Sources in the registry snapshot
    pub sources: usize,
    /// Sources skipped because the fetch failed
    pub failed_sources: usize,
    /// Distinct values extracted
    pub records: usize,
    pub outcome: IngestionOutcome,
    /// Records removed by the trailing duplicate cleanup
    pub duplicates_removed: u64,
}

/// Something that can refresh a list kind
///
/// The watcher and the scheduled jobs only see this trait.
#[async_trait]
pub trait Ingestor: Send + Sync {
    async fn ingest(&self, kind: ListKind) -> Result<IngestionReport>;
}

/// Load the source registry of `kind`
///
/// Malformed registry entries are logged and skipped; the reserved
/// `trigger` label is excluded for the IP kind.
pub async fn load_registry(
    store: &dyn DocumentStore,
    collections: &Collections,
    kind: ListKind,
) -> Result<RegistrySnapshot> {
    let docs = store.find(collections.registry(kind)).await?;
    let entries = docs.into_iter().filter_map(|doc| {
        match serde_json::from_value::<SourceEntry>(Value::Object(doc)) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping malformed {} registry entry: {}", kind, e);
                None
            }
        }
    });
    Ok(RegistrySnapshot::from_entries(kind, entries))
}

/// Read the `last_updated` metadata timestamp
pub async fn last_updated(
    store: &dyn DocumentStore,
    collections: &Collections,
) -> Result<Option<DateTime<Utc>>> {
    let Some(doc) = store
        .find_one(&collections.metadata, &Value::from(LAST_UPDATED_ID))
        .await?
    else {
        return Ok(None);
    };

    let Some(raw) = doc.get("timestamp").and_then(Value::as_str) else {
        return Ok(None);
    };
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| Error::store(format!("Invalid metadata timestamp {}: {}", raw, e)))?;
    Ok(Some(parsed.with_timezone(&Utc)))
}

/// The generic ingestion pipeline
pub struct IngestionPipeline {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn Cache>,
    fetcher: SourceFetcher,
    collections: Collections,
    extractors: [Box<dyn Extractor>; 3],
    dedup: Deduplicator,
    generations: [AtomicU64; 3],
    replace_locks: [Mutex<()>; 3],
}

impl IngestionPipeline {
    /// Create a pipeline
    ///
    /// # Parameters
    ///
    /// - `store`: registries in, results and metadata out
    /// - `cache`: flushed after every replace
    /// - `fetcher`: resolves and fetches sources
    /// - `collections`: collection names
    /// - `extraction`: extraction policy
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn Cache>,
        fetcher: SourceFetcher,
        collections: Collections,
        extraction: &ExtractionConfig,
    ) -> Result<Self> {
        let extractors = [
            extractor_for(ListKind::Ip, extraction)?,
            extractor_for(ListKind::Domain, extraction)?,
            extractor_for(ListKind::Url, extraction)?,
        ];
        let dedup = Deduplicator::new(Arc::clone(&store), collections.clone());

        Ok(Self {
            store,
            cache,
            fetcher,
            collections,
            extractors,
            dedup,
            generations: Default::default(),
            replace_locks: Default::default(),
        })
    }

    /// Run one ingestion of `kind`
    pub async fn run(&self, kind: ListKind) -> Result<IngestionReport> {
        let slot = kind.index();
        let generation = self.generations[slot].fetch_add(1, Ordering::SeqCst) + 1;

        let snapshot = load_registry(self.store.as_ref(), &self.collections, kind).await?;
        let (records, failed_sources) = self.collect(kind, &snapshot).await;

        let mut report = IngestionReport {
            kind,
            generation,
            sources: snapshot.len(),
            failed_sources,
            records: records.len(),
            outcome: IngestionOutcome::Unchanged,
            duplicates_removed: 0,
        };

        if records.is_empty() {
            info!(
                "No {} values extracted from {} source(s); keeping stored list",
                kind,
                snapshot.len()
            );
            return Ok(report);
        }

        let _guard = self.replace_locks[slot].lock().await;

        let latest = self.generations[slot].load(Ordering::SeqCst);
        if latest != generation {
            warn!(
                "Discarding {} run {}: superseded by run {}",
                kind, generation, latest
            );
            report.outcome = IngestionOutcome::Superseded;
            return Ok(report);
        }

        self.replace(kind, &records).await?;
        report.outcome = IngestionOutcome::Replaced;

        if let Err(e) = self.cache.flush_all().await {
            error!("Failed to flush cache after {} update: {}", kind, e);
        }

        report.duplicates_removed = self.dedup.run(kind).await?;
        Ok(report)
    }

    /// Fetch every source and extract values, first-seen label winning
    async fn collect(
        &self,
        kind: ListKind,
        snapshot: &RegistrySnapshot,
    ) -> (Vec<ResultRecord>, usize) {
        let extractor = &self.extractors[kind.index()];
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut failed = 0;

        for (label, url) in snapshot.iter() {
            let lines = match self.fetcher.fetch_lines(url).await {
                Ok(lines) => lines,
                Err(e) => {
                    error!("Failed to fetch {} list {} from {}: {}", kind, label, url, e);
                    failed += 1;
                    continue;
                }
            };

            for line in &lines {
                for value in extractor.extract(line) {
                    if seen.contains(&value) {
                        debug!("Duplicate {} {} removed from {}", kind, value, url);
                        continue;
                    }
                    seen.insert(value.clone());
                    records.push(ResultRecord::new(value, label));
                }
            }
        }

        (records, failed)
    }

    async fn replace(&self, kind: ListKind, records: &[ResultRecord]) -> Result<()> {
        let collection = self.collections.results(kind);
        let now = Utc::now();

        let docs: Vec<Document> = records.iter().map(|r| r.to_document(kind)).collect();
        self.store.delete_many(collection, &Filter::All).await?;
        self.store.insert_many(collection, docs).await?;

        let mut fields = Document::new();
        fields.insert("timestamp".to_string(), Value::from(now.to_rfc3339()));
        self.store
            .update_one(
                &self.collections.metadata,
                &Value::from(LAST_UPDATED_ID),
                fields,
                true,
            )
            .await?;

        info!("{} list updated at {} ({} records)", kind, now, records.len());
        Ok(())
    }
}

#[async_trait]
impl Ingestor for IngestionPipeline {
    async fn ingest(&self, kind: ListKind) -> Result<IngestionReport> {
        self.run(kind).await
    }
}
