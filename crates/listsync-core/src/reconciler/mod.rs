//! Settings-driven schedule reconciliation
//!
//! The operator controls the periodic ingestion through the settings
//! document: how many hours between runs, and whether the runs happen at
//! all. The ScheduleReconciler keeps the scheduler's three ingestion jobs
//! in line with that document.
//!
//! ## Reconcile Flow
//!
//! 1. Re-read the settings (absent document means 1 hour, enabled)
//! 2. Interval changed: remove the three jobs, store the new interval,
//!    re-add them if automatic updates are on
//! 3. Flag changed: remove the three jobs, store the new flag, re-add
//!    them if the new flag is on
//!
//! The two checks are independent. Jobs are always removed before they are
//! added again, so an id is never registered twice.

use crate::config::Collections;
use crate::error::Result;
use crate::model::{ListKind, SETTINGS_ID, Settings};
use crate::pipeline::Ingestor;
use crate::traits::{DocumentStore, Job, Scheduler};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Id of the reconcile job itself
pub const RECONCILE_JOB_ID: &str = "listen_for_settings_updates";

const SECONDS_PER_HOUR: u64 = 3600;

/// Longest accepted update interval: one year
pub const MAX_UPDATE_INTERVAL_HOURS: u64 = 24 * 365;

/// Schedule the reconciler believes is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerState {
    pub update_interval_hours: u64,
    pub automatic_update: bool,
}

impl Default for SchedulerState {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            update_interval_hours: settings.update_interval as u64,
            automatic_update: settings.enable_automatic_update,
        }
    }
}

impl SchedulerState {
    /// Interval of the periodic ingestion jobs
    pub fn every(&self) -> Duration {
        Duration::from_secs(self.update_interval_hours.saturating_mul(SECONDS_PER_HOUR))
    }
}

/// What a reconcile pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub interval_changed: bool,
    pub automatic_update_changed: bool,
}

impl ReconcileOutcome {
    pub fn changed(&self) -> bool {
        self.interval_changed || self.automatic_update_changed
    }
}

/// Keeps the periodic ingestion jobs in line with the settings document
pub struct ScheduleReconciler {
    store: Arc<dyn DocumentStore>,
    collections: Collections,
    scheduler: Arc<dyn Scheduler>,
    ingestor: Arc<dyn Ingestor>,
    state: Mutex<SchedulerState>,
}

impl ScheduleReconciler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collections: Collections,
        scheduler: Arc<dyn Scheduler>,
        ingestor: Arc<dyn Ingestor>,
    ) -> Self {
        Self {
            store,
            collections,
            scheduler,
            ingestor,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Currently held schedule
    pub async fn state(&self) -> SchedulerState {
        *self.state.lock().await
    }

    /// Read the settings document, defaulting when absent
    pub async fn read_settings(&self) -> Result<Settings> {
        let doc = self
            .store
            .find_one(&self.collections.settings, &Value::from(SETTINGS_ID))
            .await?;

        match doc {
            Some(doc) => Ok(serde_json::from_value(Value::Object(doc))?),
            None => Ok(Settings::default()),
        }
    }

    /// Load the held state from the settings document
    ///
    /// Does not touch the scheduler; follow with [`Self::install_jobs`].
    pub async fn seed(&self) -> Result<SchedulerState> {
        let settings = self.read_settings().await?;
        let mut state = self.state.lock().await;

        if let Some(hours) = valid_interval(settings.update_interval) {
            state.update_interval_hours = hours;
        }
        state.automatic_update = settings.enable_automatic_update;

        info!(
            "Update interval {}h, automatic update {}",
            state.update_interval_hours,
            if state.automatic_update { "on" } else { "off" }
        );
        Ok(*state)
    }

    /// Install the ingestion jobs for the held state
    pub async fn install_jobs(&self) -> Result<()> {
        let state = self.state.lock().await;
        self.remove_ingestion_jobs().await?;
        if state.automatic_update {
            self.add_ingestion_jobs(state.every()).await?;
        }
        Ok(())
    }

    /// Bring the scheduler in line with the current settings
    pub async fn reconcile(&self) -> Result<ReconcileOutcome> {
        let settings = self.read_settings().await?;
        let mut state = self.state.lock().await;
        let mut outcome = ReconcileOutcome::default();

        if let Some(hours) = valid_interval(settings.update_interval)
            && hours != state.update_interval_hours
        {
            info!(
                "Update interval changed from {}h to {}h; rescheduling",
                state.update_interval_hours, hours
            );
            self.remove_ingestion_jobs().await?;
            state.update_interval_hours = hours;
            if state.automatic_update {
                self.add_ingestion_jobs(state.every()).await?;
            }
            outcome.interval_changed = true;
        }

        if settings.enable_automatic_update != state.automatic_update {
            info!(
                "Automatic update turned {}; rescheduling",
                if settings.enable_automatic_update { "on" } else { "off" }
            );
            self.remove_ingestion_jobs().await?;
            state.automatic_update = settings.enable_automatic_update;
            if state.automatic_update {
                self.add_ingestion_jobs(state.every()).await?;
            }
            outcome.automatic_update_changed = true;
        }

        if !outcome.changed() {
            debug!("Settings unchanged");
        }
        Ok(outcome)
    }

    /// Register the reconcile pass itself as a recurring job
    pub async fn register(self: Arc<Self>, every: Duration) -> Result<()> {
        let scheduler = Arc::clone(&self.scheduler);
        let job: Job = Arc::new(move || {
            let reconciler = Arc::clone(&self);
            Box::pin(async move {
                if let Err(e) = reconciler.reconcile().await {
                    error!("Failed to reconcile schedule with settings: {}", e);
                }
            })
        });
        scheduler.add_job(RECONCILE_JOB_ID, every, job).await
    }

    async fn remove_ingestion_jobs(&self) -> Result<()> {
        for kind in ListKind::ALL {
            if self.scheduler.has_job(kind.job_id()).await {
                self.scheduler.remove_job(kind.job_id()).await?;
            }
        }
        Ok(())
    }

    async fn add_ingestion_jobs(&self, every: Duration) -> Result<()> {
        for kind in ListKind::ALL {
            let job = ingestion_job(Arc::clone(&self.ingestor), kind);
            self.scheduler.add_job(kind.job_id(), every, job).await?;
        }
        Ok(())
    }
}

/// Scheduler job that runs one ingestion of `kind`
pub fn ingestion_job(ingestor: Arc<dyn Ingestor>, kind: ListKind) -> Job {
    Arc::new(move || {
        let ingestor = Arc::clone(&ingestor);
        Box::pin(async move {
            match ingestor.ingest(kind).await {
                Ok(report) => debug!("Scheduled {} refresh: {:?}", kind, report.outcome),
                Err(e) => error!("Scheduled {} refresh failed: {}", kind, e),
            }
        })
    })
}

fn valid_interval(hours: i64) -> Option<u64> {
    let accepted = u64::try_from(hours)
        .ok()
        .filter(|hours| (1..=MAX_UPDATE_INTERVAL_HOURS).contains(hours))
        .filter(|hours| hours.checked_mul(SECONDS_PER_HOUR).is_some());
    if accepted.is_none() {
        warn!(
            "Ignoring update interval {}h; must be between 1 and {}",
            hours, MAX_UPDATE_INTERVAL_HOURS
        );
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{IngestionOutcome, IngestionReport};
    use crate::scheduler::IntervalScheduler;
    use crate::store::MemoryDocumentStore;
    use crate::traits::Document;
    use async_trait::async_trait;
    use serde_json::json;

    struct NoopIngestor;

    #[async_trait]
    impl Ingestor for NoopIngestor {
        async fn ingest(&self, kind: ListKind) -> Result<IngestionReport> {
            Ok(IngestionReport {
                kind,
                generation: 0,
                sources: 0,
                failed_sources: 0,
                records: 0,
                outcome: IngestionOutcome::Unchanged,
                duplicates_removed: 0,
            })
        }
    }

    fn reconciler(store: &MemoryDocumentStore) -> (Arc<IntervalScheduler>, ScheduleReconciler) {
        let scheduler = Arc::new(IntervalScheduler::new());
        let reconciler = ScheduleReconciler::new(
            Arc::new(store.clone()),
            Collections::default(),
            scheduler.clone(),
            Arc::new(NoopIngestor),
        );
        (scheduler, reconciler)
    }

    async fn put_settings(store: &MemoryDocumentStore, settings: serde_json::Value) {
        let fields: Document = settings.as_object().cloned().unwrap();
        store
            .update_one("settings", &json!(SETTINGS_ID), fields, true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_seed_defaults_without_document() {
        let store = MemoryDocumentStore::new();
        let (scheduler, reconciler) = reconciler(&store);

        let state = reconciler.seed().await.unwrap();
        assert_eq!(state, SchedulerState::default());

        reconciler.install_jobs().await.unwrap();
        assert_eq!(
            scheduler.job_ids().await,
            vec![
                "fetch_and_store_domains",
                "fetch_and_store_ips",
                "fetch_and_store_urls"
            ]
        );
        assert_eq!(
            scheduler.job_interval("fetch_and_store_ips").await,
            Some(Duration::from_secs(3600))
        );
    }

    #[tokio::test]
    async fn test_invalid_interval_is_ignored() {
        let store = MemoryDocumentStore::new();
        let (_scheduler, reconciler) = reconciler(&store);
        reconciler.seed().await.unwrap();

        put_settings(&store, json!({"update_interval": 0, "enable_automatic_update": true})).await;

        let outcome = reconciler.reconcile().await.unwrap();
        assert!(!outcome.changed());
        assert_eq!(reconciler.state().await.update_interval_hours, 1);
    }

    #[tokio::test]
    async fn test_oversized_interval_is_ignored() {
        let store = MemoryDocumentStore::new();
        let (scheduler, reconciler) = reconciler(&store);
        reconciler.seed().await.unwrap();
        reconciler.install_jobs().await.unwrap();

        for hours in [6_000_000_000_000_000_i64, i64::MAX, 24 * 365 + 1] {
            put_settings(
                &store,
                json!({"update_interval": hours, "enable_automatic_update": true}),
            )
            .await;
            assert!(!reconciler.reconcile().await.unwrap().changed());
        }
        assert_eq!(reconciler.state().await, SchedulerState::default());
        assert_eq!(
            scheduler.job_interval("fetch_and_store_ips").await,
            Some(Duration::from_secs(3600))
        );

        put_settings(
            &store,
            json!({"update_interval": 24 * 365, "enable_automatic_update": true}),
        )
        .await;
        assert!(reconciler.reconcile().await.unwrap().interval_changed);
        assert_eq!(
            scheduler.job_interval("fetch_and_store_ips").await,
            Some(Duration::from_secs(24 * 365 * 3600))
        );
    }

    #[test]
    fn test_every_saturates() {
        let state = SchedulerState {
            update_interval_hours: u64::MAX,
            automatic_update: true,
        };
        assert_eq!(state.every(), Duration::from_secs(u64::MAX));
    }

    #[tokio::test]
    async fn test_both_changes_in_one_pass() {
        let store = MemoryDocumentStore::new();
        let (scheduler, reconciler) = reconciler(&store);
        reconciler.seed().await.unwrap();
        reconciler.install_jobs().await.unwrap();

        put_settings(&store, json!({"update_interval": 6, "enable_automatic_update": false})).await;
        let outcome = reconciler.reconcile().await.unwrap();
        assert!(outcome.interval_changed && outcome.automatic_update_changed);
        assert!(scheduler.job_ids().await.is_empty());

        put_settings(&store, json!({"update_interval": 6, "enable_automatic_update": true})).await;
        reconciler.reconcile().await.unwrap();
        assert_eq!(
            scheduler.job_interval("fetch_and_store_urls").await,
            Some(Duration::from_secs(6 * 3600))
        );
    }

    #[tokio::test]
    async fn test_register_adds_reconcile_job() {
        let store = MemoryDocumentStore::new();
        let (scheduler, reconciler) = reconciler(&store);

        Arc::new(reconciler)
            .register(Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(
            scheduler.job_interval(RECONCILE_JOB_ID).await,
            Some(Duration::from_secs(10))
        );
    }
}
