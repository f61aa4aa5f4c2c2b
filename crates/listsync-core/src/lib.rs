// # listsync-core
//
// Core library for the listsync ingestion engine.
//
// listsync keeps three threat-intelligence lists (IP addresses, domains and
// URLs) in a document store, refreshed from operator-registered sources.
//
// ## Architecture Overview
//
// - **Extractor**: Pulls valid values of one list kind out of text
// - **SourceFetcher**: Resolves a source URL to local disk or a remote fetch
// - **IngestionPipeline**: Fetch, extract, replace, flush cache, deduplicate
// - **ChangeWatcher**: Polls the source registries, ingests on change
// - **ScheduleReconciler**: Keeps the periodic jobs in line with settings
// - **Deduplicator**: Collapses residual duplicate records
// - **ListService**: Bootstraps everything and owns the lifecycle
// - **BackendRegistry**: Plugin-based registry for stores, caches, transports
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Engine logic is separate from backends
// 2. **One Pipeline**: All list kinds share one pipeline, parameterized by kind
// 3. **Plugin-Based**: Backends are registered by name, no hard-coded if-else
// 4. **Library-First**: The daemon is a thin layer over this crate
// 5. **Latest Wins**: Overlapping runs of one kind never interleave replaces

pub mod cache;
pub mod config;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod model;
pub mod pipeline;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod traits;
pub mod watcher;

// Re-export core types for convenience
pub use cache::MemoryCache;
pub use config::{CacheConfig, Collections, StoreConfig, UpdaterConfig};
pub use dedup::Deduplicator;
pub use error::{Error, Result};
pub use extract::{Extractor, extractor_for};
pub use fetch::SourceFetcher;
pub use model::{ListKind, RegistrySnapshot, ResultRecord, Settings, SourceEntry};
pub use pipeline::{IngestionOutcome, IngestionPipeline, IngestionReport, Ingestor};
pub use reconciler::{ReconcileOutcome, ScheduleReconciler, SchedulerState};
pub use registry::BackendRegistry;
pub use scheduler::IntervalScheduler;
pub use service::ListService;
pub use store::{FileDocumentStore, MemoryDocumentStore};
pub use traits::{Cache, DocumentStore, Scheduler, Transport};
pub use watcher::{ChangeWatcher, WatchEvent};
