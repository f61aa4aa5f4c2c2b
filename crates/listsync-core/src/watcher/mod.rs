//! Registry change watcher
//!
//! The ChangeWatcher polls the three source registries and starts an
//! ingestion of a kind whenever that kind's registry differs from the copy
//! taken on the previous poll.
//!
//! ## Event Flow
//!
//! 1. Snapshot all three registries at start (no ingestion for these)
//! 2. Every `watch_interval_ms`, re-read each registry
//! 3. On a difference, ingest that kind
//! 4. Advance the stored snapshot only after the ingestion succeeded, so a
//!    failed run is retried on the next poll
//! 5. Emit an event for monitoring/logging
//!
//! The reserved `trigger` label never reaches a snapshot, so editing it
//! does not count as a change.

use crate::config::{Collections, EngineConfig};
use crate::error::Result;
use crate::model::{ListKind, RegistrySnapshot};
use crate::pipeline::{IngestionOutcome, Ingestor, load_registry};
use crate::traits::DocumentStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Events emitted by the ChangeWatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Watcher took its initial snapshots
    Started { sources: usize },

    /// A registry differs from the previous snapshot
    RegistryChanged { kind: ListKind, sources: usize },

    /// The triggered ingestion finished
    IngestionCompleted {
        kind: ListKind,
        outcome: IngestionOutcome,
        records: usize,
    },

    /// The triggered ingestion failed; it is retried on the next poll
    IngestionFailed { kind: ListKind, error: String },

    /// Watcher stopped
    Stopped { reason: String },
}

/// Last seen registry of each kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshots {
    by_kind: [RegistrySnapshot; 3],
}

impl Snapshots {
    pub fn get(&self, kind: ListKind) -> &RegistrySnapshot {
        &self.by_kind[kind.index()]
    }

    pub fn set(&mut self, kind: ListKind, snapshot: RegistrySnapshot) {
        self.by_kind[kind.index()] = snapshot;
    }

    /// Total number of sources across kinds
    pub fn sources(&self) -> usize {
        self.by_kind.iter().map(RegistrySnapshot::len).sum()
    }
}

/// Polls the source registries and triggers ingestions on change
pub struct ChangeWatcher {
    store: Arc<dyn DocumentStore>,
    collections: Collections,
    ingestor: Arc<dyn Ingestor>,
    interval: Duration,
    event_tx: mpsc::Sender<WatchEvent>,
}

impl ChangeWatcher {
    /// Create a new watcher
    ///
    /// # Parameters
    ///
    /// - `store`: where the registries live
    /// - `collections`: collection names
    /// - `ingestor`: started for every changed kind
    /// - `config`: poll interval and event channel capacity
    ///
    /// # Returns
    ///
    /// A tuple of (watcher, event_receiver)
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collections: Collections,
        ingestor: Arc<dyn Ingestor>,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<WatchEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let watcher = Self {
            store,
            collections,
            ingestor,
            interval: Duration::from_millis(config.watch_interval_ms),
            event_tx: tx,
        };

        Ok((watcher, rx))
    }

    /// Read the current registry of every kind
    pub async fn snapshot(&self) -> Result<Snapshots> {
        let mut snapshots = Snapshots::default();
        for kind in ListKind::ALL {
            let current = load_registry(self.store.as_ref(), &self.collections, kind).await?;
            snapshots.set(kind, current);
        }
        Ok(snapshots)
    }

    /// Poll every registry once against `previous`
    ///
    /// # Returns
    ///
    /// The kinds whose ingestion ran and succeeded. A kind whose registry
    /// could not be read or whose ingestion failed keeps its old snapshot.
    pub async fn poll_once(&self, previous: &mut Snapshots) -> Vec<ListKind> {
        let mut ingested = Vec::new();

        for kind in ListKind::ALL {
            let current =
                match load_registry(self.store.as_ref(), &self.collections, kind).await {
                    Ok(current) => current,
                    Err(e) => {
                        error!("Failed to read {} registry: {}", kind, e);
                        continue;
                    }
                };

            if &current == previous.get(kind) {
                continue;
            }

            info!(
                "{} registry changed ({} -> {} sources); refreshing",
                kind,
                previous.get(kind).len(),
                current.len()
            );
            self.emit_event(WatchEvent::RegistryChanged {
                kind,
                sources: current.len(),
            });

            match self.ingestor.ingest(kind).await {
                Ok(report) => {
                    debug!("{} refresh finished: {:?}", kind, report.outcome);
                    self.emit_event(WatchEvent::IngestionCompleted {
                        kind,
                        outcome: report.outcome,
                        records: report.records,
                    });
                    previous.set(kind, current);
                    ingested.push(kind);
                }
                Err(e) => {
                    error!("Failed to refresh {} list: {}", kind, e);
                    self.emit_event(WatchEvent::IngestionFailed {
                        kind,
                        error: e.to_string(),
                    });
                }
            }
        }

        ingested
    }

    /// Run the watcher until the process receives SIGINT
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the watcher until `shutdown_rx` fires
    pub async fn run_with_shutdown(&self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.run_internal(Some(shutdown_rx)).await
    }

    /// Run the watcher from already captured snapshots until
    /// `shutdown_rx` fires
    ///
    /// Lets the caller take the initial snapshot before spawning, so no
    /// edit made after this call is missed.
    pub async fn run_from(
        &self,
        snapshots: Snapshots,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<()> {
        self.watch(snapshots, Some(shutdown_rx)).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        let snapshots = self.snapshot().await?;
        self.watch(snapshots, shutdown_rx).await
    }

    async fn watch(
        &self,
        mut snapshots: Snapshots,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        info!(
            "Watching {} source(s) every {:?}",
            snapshots.sources(),
            self.interval
        );
        self.emit_event(WatchEvent::Started {
            sources: snapshots.sources(),
        });

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    // A dropped sender counts as a shutdown request
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.poll_once(&mut snapshots).await;
                }

                _ = &mut shutdown => {
                    info!("Watcher shutdown requested");
                    self.emit_event(WatchEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        Ok(())
    }

    fn emit_event(&self, event: WatchEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping watcher event");
        }
    }
}
