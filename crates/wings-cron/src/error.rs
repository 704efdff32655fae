// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum CronError {
    /// The scheduler has already been constructed once in this process.
    #[error("cron scheduler already initialized")]
    Conflict,
    #[error("scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}
