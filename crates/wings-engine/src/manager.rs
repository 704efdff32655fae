// SPDX-License-Identifier: MIT

//! `ServerManager`: the server registry, boot reconciliation, and the
//! state-persistence ticker (spec.md §4.6). Directly modeled on the
//! teacher's `lifecycle::startup`/`reconcile` sequencing — "load snapshot
//! → reconcile → start listeners" — generalized from that system's
//! sequential per-job reconcile loop into a bounded worker pool, since here
//! each server's reconciliation is an independent, possibly slow Docker
//! round-trip rather than an in-process state check.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use wings_adapters::{ContainerAdapter, ContainerStatus};
use wings_core::{PowerState, ServerId};
use wings_eggconfig::DoneMarkerMatcher;
use wings_fs::ServerFilesystem;
use wings_panel::{InstallStatus, PanelClient, ServerSpec};
use wings_store::{StateSnapshot, Store};

use crate::error::EngineError;
use crate::server::Server;

const BOOT_RECONCILE_PARALLELISM: usize = 4;
const BOOT_RECONCILE_TIMEOUT: Duration = Duration::from_secs(30);
const PERSISTENCE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    pub delete_files: bool,
}

pub struct ServerManager {
    servers: RwLock<HashMap<ServerId, Arc<Server>>>,
    adapter: Arc<dyn ContainerAdapter>,
    panel: Arc<PanelClient>,
    states: StateSnapshot,
    data_root: PathBuf,
    /// Process-wide shutdown signal; Panel calls made from background tasks
    /// (boot reconciliation, install) race against it so a shutdown doesn't
    /// wait out a stuck retry loop.
    shutdown: CancellationToken,
}

impl ServerManager {
    pub fn new(
        adapter: Arc<dyn ContainerAdapter>,
        panel: Arc<PanelClient>,
        store: &Store,
        data_root: impl Into<PathBuf>,
        shutdown: CancellationToken,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            servers: RwLock::new(HashMap::new()),
            adapter,
            panel,
            states: store.states()?,
            data_root: data_root.into(),
            shutdown,
        })
    }

    pub fn all(&self) -> Vec<Arc<Server>> {
        self.servers.read().values().cloned().collect()
    }

    pub fn get(&self, id: ServerId) -> Option<Arc<Server>> {
        self.servers.read().get(&id).cloned()
    }

    /// Fetches configuration from the Panel and installs if requested
    /// (spec.md §4.6.3). The install itself runs in the background so the
    /// caller isn't blocked on a potentially long-running script.
    pub async fn add(&self, id: ServerId, install: bool) -> Result<Arc<Server>, EngineError> {
        let spec = self.panel.get_server(id, &self.shutdown).await?;
        let server = self.materialize(spec);
        server.fs().ensure_root_exists().await?;
        self.servers.write().insert(id, Arc::clone(&server));

        if install {
            let server = Arc::clone(&server);
            let adapter = Arc::clone(&self.adapter);
            let panel = Arc::clone(&self.panel);
            let cancel = self.shutdown.clone();
            tokio::spawn(async move { run_install(server, adapter, panel, cancel).await });
        }

        Ok(server)
    }

    /// Cancels the background context, stops the container, deletes the
    /// data directory if requested, and removes the registry entry.
    pub async fn remove(&self, id: ServerId, options: RemoveOptions) -> Result<(), EngineError> {
        let server = self.servers.write().remove(&id).ok_or(EngineError::NotFound)?;

        server.cancel_background();
        let config = server.config_snapshot();
        if let Err(err) = self
            .adapter
            .stop(id, &config.stop, Duration::from_secs(config.stop_grace_seconds))
            .await
        {
            warn!(server = %id, %err, "failed to stop container during removal");
        }
        if let Err(err) = self.adapter.destroy(id).await {
            warn!(server = %id, %err, "failed to destroy container during removal");
        }

        if options.delete_files {
            if let Err(err) = tokio::fs::remove_dir_all(server.fs().root()).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(server = %id, %err, "failed to delete data directory during removal");
                }
            }
        }

        Ok(())
    }

    fn materialize(&self, spec: ServerSpec) -> Arc<Server> {
        let fs = ServerFilesystem::new(
            self.data_root.join(spec.uuid.to_string()),
            spec.settings.uid,
            spec.settings.gid,
            spec.settings.limits.disk_bytes,
        );
        let server = Arc::new(Server::new(spec.uuid, spec.settings, fs));
        server.set_installing(spec.is_installing);
        server.set_transferring(spec.is_transferring);
        server
    }

    /// Boot reconciliation (spec.md §4.6.1), steps 1-6.
    pub async fn boot_reconcile(&self) -> Result<(), EngineError> {
        let snapshot = self.states.load_all()?;
        let specs = self.panel.list_servers(&self.shutdown).await?;
        info!(count = specs.len(), "fetched server list from panel");

        let mut materialized = Vec::with_capacity(specs.len());
        for spec in specs {
            let id = spec.uuid;
            let server = self.materialize(spec);
            server.set_state(snapshot.get(&id).copied().unwrap_or(PowerState::Offline));

            if let Err(err) = server.fs().ensure_root_exists().await {
                error!(server = %id, %err, "failed to create data directory, skipping server at boot");
                continue;
            }

            self.servers.write().insert(id, Arc::clone(&server));
            materialized.push(server);
        }

        let mut tasks = tokio::task::JoinSet::new();
        let mut pending = materialized.into_iter();
        for server in pending.by_ref().take(BOOT_RECONCILE_PARALLELISM) {
            self.spawn_reconcile_task(&mut tasks, server);
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(join_err) = result {
                warn!(%join_err, "boot reconciliation task panicked");
            }
            if let Some(next) = pending.next() {
                self.spawn_reconcile_task(&mut tasks, next);
            }
        }

        if let Err(err) = self.panel.reset_stuck_servers(&self.shutdown).await {
            warn!(%err, "failed to reset stuck installing/restoring flags");
        }

        Ok(())
    }

    fn spawn_reconcile_task(&self, tasks: &mut tokio::task::JoinSet<()>, server: Arc<Server>) {
        let adapter = Arc::clone(&self.adapter);
        tasks.spawn(async move {
            if tokio::time::timeout(BOOT_RECONCILE_TIMEOUT, reconcile_one(server, adapter)).await.is_err() {
                warn!("boot reconciliation for a server timed out");
            }
        });
    }

    /// The 60s state-persistence ticker (spec.md §4.6.2); also runs once
    /// more after `cancel` fires, covering clean shutdown.
    pub async fn run_persistence_ticker(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(PERSISTENCE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => self.persist_snapshot(),
            }
        }
        self.persist_snapshot();
    }

    fn persist_snapshot(&self) {
        let states: HashMap<ServerId, PowerState> =
            self.servers.read().iter().map(|(id, server)| (*id, server.state())).collect();
        if let Err(err) = self.states.replace_all(&states) {
            warn!(%err, "failed to persist state snapshot");
        }
    }
}

async fn reconcile_one(server: Arc<Server>, adapter: Arc<dyn ContainerAdapter>) {
    let status = match adapter.status(server.id).await {
        Ok(status) => status,
        Err(err) => {
            warn!(server = %server.id, %err, "failed to query container status during reconciliation");
            return;
        }
    };

    // A container that exists but isn't running means whatever the snapshot
    // claimed, it's offline now — wings doesn't auto-restart crashed
    // servers discovered at boot unless crash-restart is separately
    // configured at runtime (spec.md §8's reconciliation scenario).
    let reconciled = match status {
        ContainerStatus::NotFound | ContainerStatus::Stopped => PowerState::Offline,
        ContainerStatus::Running => PowerState::Running,
    };
    server.set_state(reconciled);

    if reconciled != PowerState::Running {
        return;
    }

    let done_markers = server.config_snapshot().process.done_markers.clone();
    match DoneMarkerMatcher::compile(&done_markers) {
        Ok(matcher) => server.spawn_session(Arc::clone(&adapter), matcher),
        Err(err) => warn!(server = %server.id, %err, "failed to compile done-markers during reconciliation"),
    }

    if let Err(err) = server.resync_config_and_limits(&adapter).await {
        warn!(server = %server.id, %err, "failed to resync configuration during reconciliation");
    }
}

async fn run_install(
    server: Arc<Server>,
    adapter: Arc<dyn ContainerAdapter>,
    panel: Arc<PanelClient>,
    cancel: CancellationToken,
) {
    server.set_installing(true);

    let script = match panel.get_install_script(server.id, &cancel).await {
        Ok(script) => script,
        Err(err) => {
            warn!(server = %server.id, %err, "failed to fetch install script");
            server.set_installing(false);
            return;
        }
    };

    let result = server.run_install_script(&adapter, &script).await;
    let successful = result.is_ok();
    if let Err(err) = &result {
        warn!(server = %server.id, %err, "install script failed");
    }

    if let Err(err) = panel
        .submit_install_status(server.id, InstallStatus { successful, reinstall: Some(false) }, &cancel)
        .await
    {
        warn!(server = %server.id, %err, "failed to report install status to panel");
    }

    server.set_installing(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use wings_adapters::fake::FakeAdapter;

    fn manager_with_fake_adapter(data_root: &std::path::Path) -> (ServerManager, Store) {
        let store = Store::open_temporary().unwrap();
        let adapter: Arc<dyn ContainerAdapter> = Arc::new(FakeAdapter::default());
        let panel = Arc::new(PanelClient::new("https://panel.example", "node-1", "token").unwrap());
        let manager = ServerManager::new(adapter, panel, &store, data_root.to_path_buf(), CancellationToken::new()).unwrap();
        (manager, store)
    }

    #[tokio::test]
    async fn get_returns_none_for_unknown_server() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _store) = manager_with_fake_adapter(dir.path());
        assert!(manager.get(ServerId::new()).is_none());
    }

    #[tokio::test]
    async fn remove_of_unknown_server_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _store) = manager_with_fake_adapter(dir.path());
        let result = manager.remove(ServerId::new(), RemoveOptions::default()).await;
        assert!(matches!(result, Err(EngineError::NotFound)));
    }

    #[tokio::test]
    async fn persistence_ticker_runs_once_then_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, store) = manager_with_fake_adapter(dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();
        manager.run_persistence_ticker(cancel).await;
        // Runs the "once more on shutdown" pass even with zero servers registered.
        assert!(store.states().unwrap().load_all().unwrap().is_empty());
    }
}
