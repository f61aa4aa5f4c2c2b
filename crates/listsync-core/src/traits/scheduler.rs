// # Scheduler Trait
//
// Named recurring jobs, added and removed by id at runtime.
//
// ## Contract
//
// - Job ids are unique: adding an id that is already present is an error,
//   so callers reconfigure with remove-then-add, never in place
// - A job never overlaps itself
// - Removing a job stops future runs; a run already in progress may finish
//
// ## Usage
//
// ```rust,ignore
// let job: Job = Arc::new(move || Box::pin(async move { /* work */ }));
// scheduler.add_job("fetch_and_store_ips", Duration::from_secs(3600), job).await?;
//
// if scheduler.has_job("fetch_and_store_ips").await {
//     scheduler.remove_job("fetch_and_store_ips").await?;
// }
// ```

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Future produced by one run of a job
pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A recurring job body, invoked once per tick
pub type Job = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Trait for job scheduler implementations
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Register `job` to run every `every`, first run one interval from now
    async fn add_job(&self, id: &str, every: Duration, job: Job) -> Result<(), crate::Error>;

    /// Remove a job
    ///
    /// Removing an unknown id is an error; check with [`Scheduler::has_job`]
    /// first when the job may already be gone.
    async fn remove_job(&self, id: &str) -> Result<(), crate::Error>;

    /// Whether a job with this id is registered
    async fn has_job(&self, id: &str) -> bool;

    /// Interval of a registered job
    async fn job_interval(&self, id: &str) -> Option<Duration>;

    /// Ids of all registered jobs, sorted
    async fn job_ids(&self) -> Vec<String>;

    /// Stop every job
    async fn shutdown(&self);
}
