// SPDX-License-Identifier: MIT

//! Shared `tracing-subscriber` wiring for every binary that boots the
//! daemon (`wings-daemon` itself and the `wings` CLI's default action),
//! so both get the same console + rotating file sink without duplicating
//! the setup.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::DaemonConfig;

/// Installs the global subscriber. The returned guard must be held for the
/// life of the process; dropping it stops the background log-flush thread.
pub fn init(config: &DaemonConfig) -> anyhow::Result<WorkerGuard> {
    let log_dir = config.system.data.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "wings.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = if config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    Ok(guard)
}
