//! Process bootstrap
//!
//! ListService wires the engine together and owns its lifecycle:
//!
//! 1. Ingest all three kinds once, in order
//! 2. Seed the schedule from the settings document and install the
//!    periodic ingestion jobs
//! 3. Start the ChangeWatcher on its own task
//! 4. Register the settings reconcile job
//! 5. On shutdown: stop the watcher, stop the scheduler, flush the store

use crate::config::UpdaterConfig;
use crate::error::{Error, Result};
use crate::fetch::SourceFetcher;
use crate::model::ListKind;
use crate::pipeline::{IngestionPipeline, IngestionReport, Ingestor};
use crate::reconciler::ScheduleReconciler;
use crate::traits::{Cache, DocumentStore, Scheduler, Transport};
use crate::watcher::{ChangeWatcher, WatchEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// The assembled ingestion service
pub struct ListService {
    config: UpdaterConfig,
    store: Arc<dyn DocumentStore>,
    scheduler: Arc<dyn Scheduler>,
    pipeline: Arc<IngestionPipeline>,
}

impl ListService {
    /// Assemble the service from its backends
    ///
    /// # Parameters
    ///
    /// - `config`: validated before anything is built
    /// - `store`: registries, results, metadata and settings
    /// - `cache`: flushed after every replace
    /// - `transport`: remote source fetches
    /// - `scheduler`: periodic jobs
    pub fn new(
        config: UpdaterConfig,
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn Cache>,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        config.validate()?;

        let fetcher = SourceFetcher::new(transport, &config.fetch);
        let pipeline = IngestionPipeline::new(
            Arc::clone(&store),
            cache,
            fetcher,
            config.collections.clone(),
            &config.extraction,
        )?;

        Ok(Self {
            config,
            store,
            scheduler,
            pipeline: Arc::new(pipeline),
        })
    }

    /// The pipeline shared by the watcher and the scheduled jobs
    pub fn pipeline(&self) -> Arc<IngestionPipeline> {
        Arc::clone(&self.pipeline)
    }

    /// Ingest every kind once, in order
    ///
    /// A store failure aborts the bootstrap.
    pub async fn ingest_all(&self) -> Result<Vec<IngestionReport>> {
        let mut reports = Vec::with_capacity(ListKind::ALL.len());
        for kind in ListKind::ALL {
            let report = self.pipeline.ingest(kind).await?;
            info!(
                "Initial {} ingestion: {} record(s) from {} source(s), {:?}",
                kind, report.records, report.sources, report.outcome
            );
            reports.push(report);
        }
        Ok(reports)
    }

    /// Run until the process receives SIGINT
    pub async fn run(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    let _ = tx.send(());
                }
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        });
        self.run_with_shutdown(rx).await
    }

    /// Run until `shutdown_rx` fires or its sender is dropped
    pub async fn run_with_shutdown(self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.ingest_all().await?;

        let ingestor: Arc<dyn Ingestor> = self.pipeline.clone();
        let reconciler = Arc::new(ScheduleReconciler::new(
            Arc::clone(&self.store),
            self.config.collections.clone(),
            Arc::clone(&self.scheduler),
            Arc::clone(&ingestor),
        ));
        reconciler.seed().await?;
        reconciler.install_jobs().await?;

        let (watcher, events) = ChangeWatcher::new(
            Arc::clone(&self.store),
            self.config.collections.clone(),
            ingestor,
            &self.config.engine,
        )?;
        let log_task = tokio::spawn(log_events(events));

        let initial = watcher.snapshot().await?;
        let (stop_tx, stop_rx) = oneshot::channel();
        let watcher_task = tokio::spawn(async move { watcher.run_from(initial, stop_rx).await });

        Arc::clone(&reconciler)
            .register(Duration::from_secs(self.config.engine.settings_poll_secs))
            .await?;

        info!("listsync service running");
        // A dropped sender counts as a shutdown request
        let _ = shutdown_rx.await;
        info!("Shutting down listsync service");

        let _ = stop_tx.send(());
        let watcher_result = watcher_task
            .await
            .map_err(|e| Error::Other(format!("Watcher task failed: {}", e)));

        self.scheduler.shutdown().await;
        self.store.flush().await?;
        // Watcher dropped its sender; the log task drains and ends
        let _ = log_task.await;

        watcher_result??;
        info!("Store flushed, service stopped");
        Ok(())
    }
}

async fn log_events(mut events: mpsc::Receiver<WatchEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Watch event: {:?}", event);
    }
}
