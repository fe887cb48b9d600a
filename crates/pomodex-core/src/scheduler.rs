//! Generic periodic job runner, used by the inactivity sweeper (C6).

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job not found: {0}")]
    JobNotFound(String),
}

#[derive(Debug, Clone, Default)]
pub struct JobStats {
    pub run_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_run: Option<Instant>,
    pub last_duration_ms: u64,
}

pub struct Job {
    pub name: String,
    pub interval: Duration,
    enabled: AtomicBool,
    run_immediately: bool,
    stats: RwLock<JobStats>,
}

impl Job {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            enabled: AtomicBool::new(true),
            run_immediately: false,
            stats: RwLock::new(JobStats::default()),
        }
    }

    pub fn run_immediately(mut self, value: bool) -> Self {
        self.run_immediately = value;
        self
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub async fn stats(&self) -> JobStats {
        self.stats.read().await.clone()
    }

    async fn record_run(&self, success: bool, duration: Duration) {
        let mut stats = self.stats.write().await;
        stats.run_count += 1;
        if success {
            stats.success_count += 1;
        } else {
            stats.failure_count += 1;
        }
        stats.last_run = Some(Instant::now());
        stats.last_duration_ms = duration.as_millis() as u64;
    }
}

pub struct JobHandle {
    name: String,
    cancelled: Arc<AtomicBool>,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        info!(job = %self.name, "job cancelled");
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Runs named, independently cancellable jobs on their own intervals. A
/// panicking job tick is recorded as a failure; the ticker keeps running.
pub struct Scheduler {
    jobs: RwLock<HashMap<String, Arc<Job>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { jobs: RwLock::new(HashMap::new()) }
    }

    pub async fn schedule<F, Fut>(&self, job: Job, task: F) -> JobHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = job.name.clone();
        let interval = job.interval;
        let run_immediately = job.run_immediately;
        let job = Arc::new(job);

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(name.clone(), job.clone());
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = JobHandle { name: name.clone(), cancelled: cancelled.clone() };

        let job_clone = job.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            if !run_immediately {
                ticker.tick().await;
            }

            loop {
                ticker.tick().await;

                if cancelled.load(Ordering::SeqCst) {
                    debug!(job = %job_clone.name, "stopping (cancelled)");
                    break;
                }
                if !job_clone.is_enabled() {
                    continue;
                }

                let start = Instant::now();
                match tokio::spawn(task()).await {
                    Ok(_) => job_clone.record_run(true, start.elapsed()).await,
                    Err(e) => {
                        job_clone.record_run(false, start.elapsed()).await;
                        error!(job = %job_clone.name, error = %e, "job panicked");
                    }
                }
            }
        });

        info!(job = %name, interval = ?interval, "scheduled job");
        handle
    }

    pub async fn get(&self, name: &str) -> Option<Arc<Job>> {
        self.jobs.read().await.get(name).cloned()
    }

    pub async fn stats(&self, name: &str) -> Result<JobStats, SchedulerError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(name).ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))?;
        Ok(job.stats().await)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test(start_paused = true)]
    async fn scheduler_runs_job_on_interval() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        scheduler
            .schedule(Job::new("sweep", Duration::from_secs(10)), move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        tokio::time::advance(Duration::from_secs(25)).await;
        tokio::task::yield_now().await;

        assert!(counter.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_job_does_not_run() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        scheduler
            .schedule(Job::new("sweep", Duration::from_secs(10)), move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        scheduler.get("sweep").await.unwrap().disable();
        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_stops_future_ticks() {
        let scheduler = Scheduler::new();
        let handle = scheduler
            .schedule(Job::new("sweep", Duration::from_millis(5)), || async {})
            .await;
        handle.cancel();
        assert_eq!(handle.name(), "sweep");
    }
}
