// SPDX-License-Identifier: MIT

//! The boot sequence (spec.md §4.6.1 step 6: "start the cron scheduler and
//! the SFTP front-end in background tasks" after reconciliation), modeled
//! on the teacher's `lifecycle::startup` + `reconcile` ordering: load state,
//! reconcile, then bring up the listeners last so nothing can reach a
//! half-initialized daemon.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;
use wings_activity::{Batcher, SftpDeduplicator, TickOutcome};
use wings_adapters::{ContainerAdapter, DockerAdapter};
use wings_cron::{CronScheduler, JobOutcome};
use wings_engine::ServerManager;
use wings_panel::PanelClient;
use wings_ssh::SshListener;
use wings_store::Store;

use crate::config::DaemonConfig;
use crate::error::DaemonError;
use crate::{http, notify};

const BATCH_SEND_COUNT: usize = 100;
const BATCH_SEND_INTERVAL: Duration = Duration::from_secs(60);
const DEDUP_SCAN_LIMIT: usize = 500;
const DEDUP_SEND_INTERVAL: Duration = Duration::from_secs(60);

/// Runs reconciliation, starts the cron scheduler and the SFTP front-end in
/// background tasks, then serves the control HTTP API until it shuts down.
pub async fn boot(config: DaemonConfig) -> Result<(), DaemonError> {
    std::fs::create_dir_all(&config.system.data)?;

    let adapter: Arc<dyn ContainerAdapter> = Arc::new(DockerAdapter::connect()?);
    let panel = Arc::new(PanelClient::new(config.remote.clone(), config.token_id.clone(), config.token.clone())?);
    let store = Store::open(config.store_path())?;
    let cancel = CancellationToken::new();
    let manager = Arc::new(ServerManager::new(
        Arc::clone(&adapter),
        Arc::clone(&panel),
        &store,
        config.system.data.clone(),
        cancel.clone(),
    )?);

    info!("starting boot reconciliation");
    manager.boot_reconcile().await?;
    info!("boot reconciliation complete");

    let persistence_manager = Arc::clone(&manager);
    let persistence_cancel = cancel.clone();
    tokio::spawn(async move { persistence_manager.run_persistence_ticker(persistence_cancel).await });

    let cron = CronScheduler::new().await?;
    let general_activity = Arc::new(store.activity()?);
    let sftp_activity = Arc::new(store.sftp_activity()?);

    let batcher = Arc::new(Batcher::new(
        Arc::clone(&general_activity),
        Arc::clone(&panel),
        BATCH_SEND_INTERVAL,
        BATCH_SEND_COUNT,
        cancel.clone(),
    ));
    cron.add_repeated("activity-batcher", batcher.send_interval(), move || {
        let batcher = Arc::clone(&batcher);
        async move { tick_outcome(batcher.tick().await) }
    })
    .await?;

    let dedup = Arc::new(SftpDeduplicator::new(
        Arc::clone(&sftp_activity),
        Arc::clone(&panel),
        DEDUP_SEND_INTERVAL,
        DEDUP_SCAN_LIMIT,
        cancel.clone(),
    ));
    cron.add_repeated("sftp-activity-dedup", dedup.send_interval(), move || {
        let dedup = Arc::clone(&dedup);
        async move { tick_outcome(dedup.tick().await) }
    })
    .await?;

    cron.start().await?;

    let host_key = wings_ssh::load_or_generate(&config.host_key_path())?;
    let sftp_listener = SshListener::new(
        host_key,
        Arc::clone(&panel),
        Arc::clone(&manager),
        Arc::clone(&general_activity),
        Arc::clone(&sftp_activity),
        config.system.sftp.read_only,
        cancel.clone(),
    );
    let sftp_addr = SocketAddr::new(config.api.host, config.system.sftp.bind_port);
    tokio::spawn(async move {
        if let Err(err) = sftp_listener.run(sftp_addr).await {
            tracing::error!(%err, "sftp front-end exited");
        }
    });

    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        shutdown_cancel.cancel();
    });

    notify::ready();
    info!("wings daemon ready");

    let http_addr = SocketAddr::new(config.api.host, config.api.port);
    http::serve(http_addr, Arc::clone(&manager), adapter, config.control_bearer(), cancel.clone()).await?;

    notify::stopping();
    Ok(())
}

fn tick_outcome(outcome: TickOutcome) -> JobOutcome {
    match outcome {
        TickOutcome::Completed => JobOutcome::Completed,
        TickOutcome::AlreadyRunning => JobOutcome::AlreadyRunning,
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                tracing::warn!(%err, "failed to install SIGTERM handler, falling back to ctrl-c only");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
