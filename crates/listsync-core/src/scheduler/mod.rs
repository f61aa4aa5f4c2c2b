// # Interval Scheduler
//
// In-process implementation of Scheduler on tokio tasks.
//
// ## Purpose
//
// Runs the periodic ingestion jobs and the settings reconcile job without
// an external job runner.
//
// ## Execution
//
// - One tokio task per job, ticking on a `tokio::time::interval`
// - First run is one interval after registration
// - All jobs share a single worker lock, so at most one job body runs at
//   a time and a job never overlaps itself
// - Missed ticks are delayed, not bursted

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::Error;
use crate::traits::scheduler::{Job, Scheduler};

struct ScheduledJob {
    every: Duration,
    handle: JoinHandle<()>,
}

/// Scheduler running each job on its own tokio task
pub struct IntervalScheduler {
    jobs: Mutex<HashMap<String, ScheduledJob>>,
    worker: Arc<Mutex<()>>,
}

impl IntervalScheduler {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            worker: Arc::new(Mutex::new(())),
        }
    }
}

impl Default for IntervalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for IntervalScheduler {
    async fn add_job(&self, id: &str, every: Duration, job: Job) -> Result<(), Error> {
        if every.is_zero() {
            return Err(Error::scheduler(format!("Job {} has a zero interval", id)));
        }

        let start = tokio::time::Instant::now().checked_add(every).ok_or_else(|| {
            Error::scheduler(format!("Job {} interval {:?} is too long", id, every))
        })?;

        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(id) {
            return Err(Error::scheduler(format!("Job {} is already scheduled", id)));
        }

        let worker = Arc::clone(&self.worker);
        let name = id.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(start, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let _slot = worker.lock().await;
                tracing::debug!("Running job {}", name);
                job().await;
            }
        });

        jobs.insert(id.to_string(), ScheduledJob { every, handle });
        tracing::info!("Scheduled job {} every {:?}", id, every);
        Ok(())
    }

    async fn remove_job(&self, id: &str) -> Result<(), Error> {
        match self.jobs.lock().await.remove(id) {
            Some(job) => {
                job.handle.abort();
                tracing::info!("Removed job {}", id);
                Ok(())
            }
            None => Err(Error::scheduler(format!("No job with id {}", id))),
        }
    }

    async fn has_job(&self, id: &str) -> bool {
        self.jobs.lock().await.contains_key(id)
    }

    async fn job_interval(&self, id: &str) -> Option<Duration> {
        self.jobs.lock().await.get(id).map(|job| job.every)
    }

    async fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn shutdown(&self) {
        let mut jobs = self.jobs.lock().await;
        for (id, job) in jobs.drain() {
            job.handle.abort();
            tracing::debug!("Stopped job {}", id);
        }
        tracing::info!("Scheduler shut down");
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        for job in self.jobs.get_mut().values() {
            job.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_job(counter: Arc<AtomicUsize>) -> Job {
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_runs_every_interval_after_first_delay() {
        let scheduler = IntervalScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        scheduler
            .add_job("tick", Duration::from_secs(60), counting_job(runs.clone()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let scheduler = IntervalScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let every = Duration::from_secs(3600);

        scheduler
            .add_job("fetch_and_store_ips", every, counting_job(runs.clone()))
            .await
            .unwrap();
        let err = scheduler
            .add_job("fetch_and_store_ips", every, counting_job(runs))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Scheduler(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_job_stops_running() {
        let scheduler = IntervalScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        scheduler
            .add_job("tick", Duration::from_secs(10), counting_job(runs.clone()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        scheduler.remove_job("tick").await.unwrap();
        assert!(!scheduler.has_job("tick").await);
        assert!(scheduler.remove_job("tick").await.is_err());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_interval_rejected() {
        let scheduler = IntervalScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let err = scheduler
            .add_job("tick", Duration::MAX, counting_job(runs))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Scheduler(_)));
        assert!(!scheduler.has_job("tick").await);
    }

    #[tokio::test]
    async fn test_shutdown_clears_jobs() {
        let scheduler = IntervalScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        for id in ["b", "a"] {
            scheduler
                .add_job(id, Duration::from_secs(3600), counting_job(runs.clone()))
                .await
                .unwrap();
        }
        assert_eq!(scheduler.job_ids().await, vec!["a", "b"]);
        assert_eq!(
            scheduler.job_interval("a").await,
            Some(Duration::from_secs(3600))
        );

        scheduler.shutdown().await;
        assert!(scheduler.job_ids().await.is_empty());
    }
}
