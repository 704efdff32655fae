// SPDX-License-Identifier: MIT

//! The singleton cron scheduler (spec.md §4.9): process-wide, constructed
//! at most once, dispatching timezone-aware and fixed-interval jobs whose
//! bodies self-report overlap via [`JobOutcome::AlreadyRunning`].

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::warn;
use uuid::Uuid;

use crate::error::CronError;

static CREATED: AtomicBool = AtomicBool::new(false);

/// Outcome of one guarded attempt at a job body.
///
/// `AlreadyRunning` is the sentinel a job returns instead of running its
/// body again; the scheduler is what logs that at warn, not the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    AlreadyRunning,
}

/// Process-wide job scheduler. `new` enforces single construction per
/// process — a second call returns [`CronError::Conflict`] per spec.md's
/// "scheduler can be created at most once per process".
pub struct CronScheduler {
    inner: Mutex<JobScheduler>,
}

impl CronScheduler {
    pub async fn new() -> Result<Self, CronError> {
        if CREATED.swap(true, Ordering::AcqRel) {
            return Err(CronError::Conflict);
        }
        let inner = JobScheduler::new().await?;
        Ok(Self { inner: Mutex::new(inner) })
    }

    /// Register a fixed-interval job. `task` is invoked every `interval`;
    /// the scheduler does not itself guard overlap, it only logs the
    /// sentinel the job body returns.
    pub async fn add_repeated<F, Fut>(&self, name: impl Into<String>, interval: Duration, mut task: F) -> Result<Uuid, CronError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        let name = name.into();
        let job = Job::new_repeated_async(interval, move |_uuid, _sched| {
            let name = name.clone();
            let fut = task();
            Box::pin(async move { log_outcome(&name, fut.await) }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })?;
        let id = self.inner.lock().await.add(job).await?;
        Ok(id)
    }

    /// Register a timezone-aware cron-expression job (spec.md §4.9's
    /// general case — an admin-configured schedule rather than a fixed
    /// system interval).
    pub async fn add_cron<F, Fut>(&self, name: impl Into<String>, schedule: &str, tz: Tz, mut task: F) -> Result<Uuid, CronError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        let name = name.into();
        let job = Job::new_async_tz(schedule, tz, move |_uuid, _sched| {
            let name = name.clone();
            let fut = task();
            Box::pin(async move { log_outcome(&name, fut.await) }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })?;
        let id = self.inner.lock().await.add(job).await?;
        Ok(id)
    }

    pub async fn start(&self) -> Result<(), CronError> {
        self.inner.lock().await.start().await?;
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), CronError> {
        self.inner.lock().await.shutdown().await?;
        Ok(())
    }
}

fn log_outcome(name: &str, outcome: JobOutcome) {
    if outcome == JobOutcome::AlreadyRunning {
        warn!(job = name, "cron job already running, skipping this tick");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    // `CREATED` is a process-global static, so both halves of the contract
    // (first construction succeeds, second conflicts) live in one test —
    // splitting them across `#[tokio::test]` functions would race, since
    // the test harness runs them concurrently in the same process.
    #[tokio::test]
    async fn construction_is_single_use_per_process() {
        CREATED.store(false, Ordering::SeqCst);
        let scheduler = CronScheduler::new().await.unwrap();

        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls_clone = calls.clone();
        scheduler
            .add_repeated("test-job", Duration::from_secs(3600), move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    JobOutcome::Completed
                }
            })
            .await
            .unwrap();

        let result = CronScheduler::new().await;
        assert!(matches!(result, Err(CronError::Conflict)));
    }
}
