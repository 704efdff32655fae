// SPDX-License-Identifier: MIT

//! wings-cron: the timezone-aware singleton job scheduler (C9).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod error;
mod scheduler;

pub use error::CronError;
pub use scheduler::{CronScheduler, JobOutcome};
