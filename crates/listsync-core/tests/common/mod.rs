//! Test doubles and common utilities for contract tests
//!
//! The doubles stand in for the engine's external collaborators and count
//! what the engine does to them.

#![allow(dead_code)]

use async_trait::async_trait;
use listsync_core::config::{Collections, UpdaterConfig};
use listsync_core::error::{Error, Result};
use listsync_core::pipeline::{IngestionOutcome, IngestionReport, Ingestor};
use listsync_core::store::MemoryDocumentStore;
use listsync_core::traits::{
    Document, DocumentStore, DuplicateGroup, Filter, Job, Scheduler, Transport,
};
use listsync_core::{ListKind, ResultRecord};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport serving canned bodies by URL; unknown URLs fail
#[derive(Clone, Default)]
pub struct MapTransport {
    bodies: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<AtomicUsize>,
}

impl MapTransport {
    pub fn new(bodies: &[(&str, &str)]) -> Self {
        let transport = Self::default();
        for (url, body) in bodies {
            transport.set(url, body);
        }
        transport
    }

    pub fn set(&self, url: &str, body: &str) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }

    /// Number of get_text() calls
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MapTransport {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::fetch(format!("{} returned HTTP 503", url)))
    }

    fn name(&self) -> &'static str {
        "map"
    }
}

/// Ingestor that records which kinds it was asked to ingest
#[derive(Clone, Default)]
pub struct CountingIngestor {
    calls: Arc<Mutex<Vec<ListKind>>>,
}

impl CountingIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ListKind> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: ListKind) -> usize {
        self.calls().iter().filter(|k| **k == kind).count()
    }
}

#[async_trait]
impl Ingestor for CountingIngestor {
    async fn ingest(&self, kind: ListKind) -> Result<IngestionReport> {
        self.calls.lock().unwrap().push(kind);
        Ok(IngestionReport {
            kind,
            generation: self.count(kind) as u64,
            sources: 0,
            failed_sources: 0,
            records: 0,
            outcome: IngestionOutcome::Unchanged,
            duplicates_removed: 0,
        })
    }
}

/// One call made to a RecordingScheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerOp {
    Add(String, Duration),
    Remove(String),
}

/// Scheduler that records operations and never runs jobs
///
/// Enforces the same id rules as the real scheduler.
#[derive(Clone, Default)]
pub struct RecordingScheduler {
    jobs: Arc<Mutex<BTreeMap<String, (Duration, Job)>>>,
    ops: Arc<Mutex<Vec<SchedulerOp>>>,
    shutdowns: Arc<AtomicUsize>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<SchedulerOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Registered job ids, sorted
    pub fn job_ids_now(&self) -> Vec<String> {
        self.jobs.lock().unwrap().keys().cloned().collect()
    }

    /// Interval of a registered job
    pub fn interval_now(&self, id: &str) -> Option<Duration> {
        self.jobs.lock().unwrap().get(id).map(|(every, _)| *every)
    }

    /// Run a registered job body once
    pub async fn run_job(&self, id: &str) {
        let job = self
            .jobs
            .lock()
            .unwrap()
            .get(id)
            .map(|(_, job)| Arc::clone(job));
        if let Some(job) = job {
            job().await;
        }
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn add_job(&self, id: &str, every: Duration, job: Job) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(id) {
            return Err(Error::scheduler(format!("Job {} is already scheduled", id)));
        }
        jobs.insert(id.to_string(), (every, job));
        self.ops
            .lock()
            .unwrap()
            .push(SchedulerOp::Add(id.to_string(), every));
        Ok(())
    }

    async fn remove_job(&self, id: &str) -> Result<()> {
        if self.jobs.lock().unwrap().remove(id).is_none() {
            return Err(Error::scheduler(format!("No job with id {}", id)));
        }
        self.ops
            .lock()
            .unwrap()
            .push(SchedulerOp::Remove(id.to_string()));
        Ok(())
    }

    async fn has_job(&self, id: &str) -> bool {
        self.jobs.lock().unwrap().contains_key(id)
    }

    async fn job_interval(&self, id: &str) -> Option<Duration> {
        self.jobs.lock().unwrap().get(id).map(|(every, _)| *every)
    }

    async fn job_ids(&self) -> Vec<String> {
        self.jobs.lock().unwrap().keys().cloned().collect()
    }

    async fn shutdown(&self) {
        self.jobs.lock().unwrap().clear();
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Memory store that counts flush() calls
#[derive(Clone, Default)]
pub struct CountingStore {
    pub inner: MemoryDocumentStore,
    flushes: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn find(&self, collection: &str) -> Result<Vec<Document>> {
        self.inner.find(collection).await
    }

    async fn find_one(&self, collection: &str, id: &Value) -> Result<Option<Document>> {
        self.inner.find_one(collection, id).await
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<()> {
        self.inner.insert_many(collection, docs).await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        self.inner.delete_many(collection, filter).await
    }

    async fn update_one(
        &self,
        collection: &str,
        id: &Value,
        fields: Document,
        upsert: bool,
    ) -> Result<()> {
        self.inner.update_one(collection, id, fields, upsert).await
    }

    async fn group_duplicates(&self, collection: &str, key: &str) -> Result<Vec<DuplicateGroup>> {
        self.inner.group_duplicates(collection, key).await
    }

    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        self.inner.flush().await
    }
}

/// Convert a JSON object literal into a document
pub fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("document must be a JSON object")
}

/// Append registry entries for `kind`
pub async fn add_sources(store: &dyn DocumentStore, kind: ListKind, entries: &[(&str, &str)]) {
    let docs = entries
        .iter()
        .map(|(source, url)| doc(json!({"source": source, "url": url})))
        .collect();
    store
        .insert_many(Collections::default().registry(kind), docs)
        .await
        .expect("registry insert succeeds");
}

/// Write the settings singleton
pub async fn put_settings(store: &dyn DocumentStore, update_interval: i64, automatic: bool) {
    store
        .update_one(
            &Collections::default().settings,
            &json!(1),
            doc(json!({
                "update_interval": update_interval,
                "enable_automatic_update": automatic,
            })),
            true,
        )
        .await
        .expect("settings upsert succeeds");
}

/// Stored result records of `kind`, in store order
pub async fn records(store: &dyn DocumentStore, kind: ListKind) -> Vec<ResultRecord> {
    store
        .find(Collections::default().results(kind))
        .await
        .expect("find succeeds")
        .iter()
        .filter_map(|doc| ResultRecord::from_document(kind, doc))
        .collect()
}

/// Configuration with a fast watcher and the default collections
pub fn fast_config() -> UpdaterConfig {
    let mut config = UpdaterConfig::new();
    config.engine.watch_interval_ms = 10;
    config
}

/// The three periodic ingestion job ids, sorted
pub fn ingestion_job_ids() -> Vec<String> {
    let mut ids: Vec<String> = ListKind::ALL
        .iter()
        .map(|kind| kind.job_id().to_string())
        .collect();
    ids.sort();
    ids
}

/// Poll `check` every 10ms for up to 2s
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
