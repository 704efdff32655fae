// SPDX-License-Identifier: MIT

//! The `Server` entity and its power FSM (spec.md §4.5).
//!
//! Power actions are serialized by `power_lock`, a `tokio::sync::Mutex<()>`
//! held across the awaits of the action's synchronous portion. The FSM's
//! current `PowerState` lives behind a separate `parking_lot::Mutex` so
//! reads (status queries, the persistence ticker) never contend with an
//! in-flight action. The `ready` and crash transitions happen from a
//! detached background task started by `start` — by the time that task
//! runs, `start`'s own hold on `power_lock` has already been released, so
//! there is no lock to re-acquire; the exclusion `power_lock` provides is
//! between concurrent *actions*, not between an action and its own monitor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wings_adapters::{ContainerAdapter, ContainerStatus, LogLine};
use wings_core::{PowerAction, PowerState, ServerConfig, ServerId};
use wings_eggconfig::DoneMarkerMatcher;
use wings_fs::{FsError, ServerFilesystem};

use crate::error::EngineError;
use crate::log_sink::{LogSinkPool, SinkName};

const CRASH_COOLDOWN: Duration = Duration::from_secs(60);
const KILL_RATE_LIMIT: Duration = Duration::from_secs(5);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(500);
const RESOURCE_POLL_INTERVAL: Duration = Duration::from_secs(10);
const ATTACH_CHANNEL_CAPACITY: usize = 256;

/// One managed server instance: its configuration, FSM state, and the
/// runtime fields listed in spec.md §4.3 (log sinks, power lock, background
/// context).
pub struct Server {
    pub id: ServerId,
    config: RwLock<ServerConfig>,
    fs: ServerFilesystem,
    state: Mutex<PowerState>,
    power_lock: tokio::sync::Mutex<()>,
    installing: AtomicBool,
    transferring: AtomicBool,
    sinks: LogSinkPool,
    cancel: Mutex<CancellationToken>,
    last_crash_at: Mutex<Option<Instant>>,
    last_kill_at: Mutex<Option<Instant>>,
    resource_usage: Mutex<Option<wings_adapters::ResourceUsage>>,
}

impl Server {
    pub fn new(id: ServerId, config: ServerConfig, fs: ServerFilesystem) -> Self {
        Self {
            id,
            config: RwLock::new(config),
            fs,
            state: Mutex::new(PowerState::Offline),
            power_lock: tokio::sync::Mutex::new(()),
            installing: AtomicBool::new(false),
            transferring: AtomicBool::new(false),
            sinks: LogSinkPool::new(),
            cancel: Mutex::new(CancellationToken::new()),
            last_crash_at: Mutex::new(None),
            last_kill_at: Mutex::new(None),
            resource_usage: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PowerState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: PowerState) {
        *self.state.lock() = state;
    }

    pub fn is_suspended(&self) -> bool {
        self.config.read().suspended
    }

    pub fn installing(&self) -> bool {
        self.installing.load(Ordering::Acquire)
    }

    pub fn set_installing(&self, value: bool) {
        self.installing.store(value, Ordering::Release);
    }

    pub fn transferring(&self) -> bool {
        self.transferring.load(Ordering::Acquire)
    }

    pub fn set_transferring(&self, value: bool) {
        self.transferring.store(value, Ordering::Release);
    }

    pub fn config_snapshot(&self) -> ServerConfig {
        self.config.read().clone()
    }

    pub fn update_config(&self, config: ServerConfig) {
        *self.config.write() = config;
    }

    pub fn fs(&self) -> &ServerFilesystem {
        &self.fs
    }

    pub fn last_resource_usage(&self) -> Option<wings_adapters::ResourceUsage> {
        *self.resource_usage.lock()
    }

    pub fn subscribe(&self, sink: SinkName) -> broadcast::Receiver<LogLine> {
        self.sinks.subscribe(sink)
    }

    /// Cancels this server's background session (attach loop, resource
    /// poller), if one is running. Used by `ServerManager::remove`.
    pub fn cancel_background(&self) {
        self.cancel.lock().cancel();
    }

    /// Entry point for an explicit power action (spec.md §4.5.2).
    ///
    /// `timeout`: `None` waits indefinitely for the power lock; `Some(d)`
    /// where `d` is zero tries the lock non-blockingly; any other `Some(d)`
    /// waits up to `d`. Either case returns [`EngineError::Locked`] instead
    /// of blocking forever.
    pub async fn handle_power_action(
        self: &Arc<Self>,
        adapter: Arc<dyn ContainerAdapter>,
        action: PowerAction,
        timeout: Option<Duration>,
    ) -> Result<(), EngineError> {
        match action {
            PowerAction::Start => {
                let _guard = self.acquire_power_lock(timeout).await?;
                self.handle_start(adapter).await
            }
            PowerAction::Stop => {
                let _guard = self.acquire_power_lock(timeout).await?;
                self.handle_stop(adapter).await
            }
            PowerAction::Kill => {
                let _guard = self.acquire_power_lock(timeout).await?;
                self.force_kill(adapter).await
            }
            // "released and reacquired within the same caller invocation"
            // (spec.md §4.5.2) — stop and start each take their own hold of
            // the lock rather than one continuous hold across both.
            PowerAction::Restart => {
                {
                    let _guard = self.acquire_power_lock(timeout).await?;
                    self.handle_stop(Arc::clone(&adapter)).await?;
                }
                let _guard = self.acquire_power_lock(timeout).await?;
                self.handle_start(adapter).await
            }
        }
    }

    async fn acquire_power_lock(&self, timeout: Option<Duration>) -> Result<tokio::sync::MutexGuard<'_, ()>, EngineError> {
        match timeout {
            None => Ok(self.power_lock.lock().await),
            Some(d) if d.is_zero() => self.power_lock.try_lock().map_err(|_| EngineError::Locked),
            Some(d) => tokio::time::timeout(d, self.power_lock.lock()).await.map_err(|_| EngineError::Locked),
        }
    }

    async fn handle_start(self: &Arc<Self>, adapter: Arc<dyn ContainerAdapter>) -> Result<(), EngineError> {
        if self.is_suspended() {
            return Err(EngineError::Suspended);
        }

        if adapter.status(self.id).await? == ContainerStatus::NotFound {
            let config = self.config_snapshot();
            adapter.create(self.id, &config).await?;
        }

        self.fs.ensure_root_exists().await?;
        self.rewrite_config_files().await?;

        adapter.start(self.id).await?;
        self.set_state(PowerState::Starting);

        let done_markers = self.config.read().process.done_markers.clone();
        let matcher = DoneMarkerMatcher::compile(&done_markers)?;
        self.spawn_session(adapter, matcher);

        Ok(())
    }

    async fn handle_stop(self: &Arc<Self>, adapter: Arc<dyn ContainerAdapter>) -> Result<(), EngineError> {
        self.set_state(PowerState::Stopping);
        let (strategy, grace) = {
            let config = self.config.read();
            (config.stop.clone(), Duration::from_secs(config.stop_grace_seconds))
        };
        adapter.stop(self.id, &strategy, grace).await?;

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if self.state() == PowerState::Offline {
                return Ok(());
            }
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }

        if self.state() != PowerState::Offline {
            warn!(server = %self.id, "stop grace period elapsed, escalating to kill");
            self.force_kill(adapter).await?;
        }
        Ok(())
    }

    /// Shared by the explicit `kill` action and `stop`'s grace-period
    /// escalation; rate-limited so an explicit kill issued right after a
    /// stop doesn't stomp on it (spec.md §4.5.2).
    async fn force_kill(self: &Arc<Self>, adapter: Arc<dyn ContainerAdapter>) -> Result<(), EngineError> {
        {
            let mut last_kill = self.last_kill_at.lock();
            if last_kill.is_some_and(|t| t.elapsed() < KILL_RATE_LIMIT) {
                return Ok(());
            }
            *last_kill = Some(Instant::now());
        }
        self.set_state(PowerState::Stopping);
        adapter.kill(self.id).await?;
        Ok(())
    }

    async fn rewrite_config_files(&self) -> Result<(), EngineError> {
        let file_edits = self.config.read().process.file_edits.clone();
        for edit in &file_edits {
            let contents = match self.fs.read(&edit.path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(FsError::NotFound) => String::new(),
                Err(err) => return Err(err.into()),
            };
            let rewritten = wings_eggconfig::apply(edit.format, &contents, &edit.replacements)?;
            self.fs.write(&edit.path, rewritten.as_bytes()).await?;
        }
        Ok(())
    }

    /// Re-applies configuration file edits and resource limits against an
    /// already-running container, as boot reconciliation's step 4 does.
    pub async fn resync_config_and_limits(&self, adapter: &Arc<dyn ContainerAdapter>) -> Result<(), EngineError> {
        self.rewrite_config_files().await?;
        let limits = self.config.read().limits.clone();
        adapter.update_limits(self.id, &limits).await?;
        Ok(())
    }

    /// Starts (or resumes, after boot reconciliation) the background
    /// attach/line-match/resource-poll session for this server.
    pub(crate) fn spawn_session(self: &Arc<Self>, adapter: Arc<dyn ContainerAdapter>, matcher: DoneMarkerMatcher) {
        let cancel = CancellationToken::new();
        *self.cancel.lock() = cancel.clone();

        let server = Arc::clone(self);
        tokio::spawn(async move { server.run_session(adapter, matcher, cancel).await });
    }

    async fn run_session(self: Arc<Self>, adapter: Arc<dyn ContainerAdapter>, matcher: DoneMarkerMatcher, cancel: CancellationToken) {
        let (tx, mut rx) = tokio::sync::mpsc::channel(ATTACH_CHANNEL_CAPACITY);
        let attach_adapter = Arc::clone(&adapter);
        let attach_server = self.id;
        let attach_cancel = cancel.clone();
        let attach_handle = tokio::spawn(async move { attach_adapter.attach(attach_server, tx, attach_cancel).await });

        let mut resource_poll = tokio::time::interval(RESOURCE_POLL_INTERVAL);
        resource_poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                line = rx.recv() => {
                    match line {
                        Some(line) => self.handle_log_line(line, &matcher),
                        None => break,
                    }
                }
                _ = resource_poll.tick() => {
                    if let Ok(usage) = adapter.resource_usage(self.id).await {
                        *self.resource_usage.lock() = Some(usage);
                    }
                }
            }
        }

        match attach_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(server = %self.id, %err, "attach session ended with an error"),
            Err(join_err) => warn!(server = %self.id, %join_err, "attach task panicked"),
        }
        if let Err(err) = adapter.detach(self.id).await {
            warn!(server = %self.id, %err, "detach after attach session failed");
        }

        self.on_session_ended(adapter).await;
    }

    fn handle_log_line(&self, line: LogLine, matcher: &DoneMarkerMatcher) {
        if self.state() == PowerState::Starting && matcher.matches(&line.line) {
            self.set_state(PowerState::Running);
            info!(server = %self.id, "server reported ready");
        }
        self.sinks.publish(SinkName::Log, line);
    }

    async fn on_session_ended(self: Arc<Self>, adapter: Arc<dyn ContainerAdapter>) {
        let previous = self.state();
        if previous == PowerState::Stopping {
            self.set_state(PowerState::Offline);
            return;
        }
        if matches!(previous, PowerState::Running | PowerState::Starting) {
            self.set_state(PowerState::Offline);
            self.maybe_restart_after_crash(adapter).await;
        }
    }

    async fn maybe_restart_after_crash(self: Arc<Self>, adapter: Arc<dyn ContainerAdapter>) {
        let crash_restart = self.config.read().crash_restart;
        let now = Instant::now();
        let within_cooldown = {
            let mut last = self.last_crash_at.lock();
            let within = last.is_some_and(|t| now.duration_since(t) < CRASH_COOLDOWN);
            *last = Some(now);
            within
        };

        if !crash_restart || within_cooldown {
            return;
        }

        warn!(server = %self.id, "restarting after unexpected exit");
        tokio::spawn(async move {
            if let Err(err) = self.handle_power_action(adapter, PowerAction::Start, None).await {
                warn!(server = %self.id, %err, "crash-restart failed");
            }
        });
    }

    /// Runs a one-off install container (entrypoint + script from the
    /// Panel's install descriptor), streaming its output to the `install`
    /// sink, and returns once it exits.
    pub async fn run_install_script(
        &self,
        adapter: &Arc<dyn ContainerAdapter>,
        script: &wings_panel::InstallScript,
    ) -> Result<(), EngineError> {
        let install_config = {
            let mut config = self.config_snapshot();
            config.image = script.container_image.clone();
            config.startup_command = format!("{} {}", script.entrypoint, script.script);
            config
        };

        adapter.create(self.id, &install_config).await?;
        adapter.start(self.id).await?;

        let (tx, mut rx) = tokio::sync::mpsc::channel(ATTACH_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let attach_adapter = Arc::clone(adapter);
        let attach_server = self.id;
        let attach_cancel = cancel.clone();
        let attach_handle = tokio::spawn(async move { attach_adapter.attach(attach_server, tx, attach_cancel).await });

        while let Some(line) = rx.recv().await {
            self.sinks.publish(SinkName::Install, line);
        }

        attach_handle
            .await
            .map_err(|err| EngineError::Adapter(wings_adapters::AdapterError::Other(err.to_string())))??;
        adapter.detach(self.id).await?;

        adapter.destroy(self.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wings_adapters::fake::FakeAdapter;
    use wings_core::{ConfigFileFormat, DoneMarker, ProcessConfiguration, ResourceLimits, StopStrategy};

    fn sample_config() -> ServerConfig {
        ServerConfig {
            limits: ResourceLimits { memory_bytes: 1024, cpu_shares: 100, disk_bytes: 1_000_000, io_weight: 500 },
            image: "registry.example/game:latest".into(),
            env: Default::default(),
            startup_command: "./start.sh".into(),
            stop: StopStrategy::Native,
            process: ProcessConfiguration {
                done_markers: vec![DoneMarker::Literal { value: "Done".into() }],
                file_edits: vec![],
            },
            suspended: false,
            skip_scripts: false,
            uid: 1000,
            gid: 1000,
            stop_grace_seconds: 1,
            crash_restart: false,
        }
    }

    fn sample_server(root: &std::path::Path) -> Arc<Server> {
        let fs = ServerFilesystem::new(root.to_path_buf(), 1000, 1000, 1_000_000);
        Arc::new(Server::new(ServerId::new(), sample_config(), fs))
    }

    #[tokio::test]
    async fn start_on_suspended_server_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let server = sample_server(dir.path());
        server.update_config(ServerConfig { suspended: true, ..sample_config() });
        let adapter: Arc<dyn ContainerAdapter> = Arc::new(FakeAdapter::default());

        let result = server.handle_power_action(adapter, PowerAction::Start, None).await;
        assert!(matches!(result, Err(EngineError::Suspended)));
    }

    #[tokio::test]
    async fn start_creates_container_and_enters_starting() {
        let dir = tempfile::tempdir().unwrap();
        let server = sample_server(dir.path());
        let adapter: Arc<dyn ContainerAdapter> = Arc::new(FakeAdapter::default());

        server.handle_power_action(Arc::clone(&adapter), PowerAction::Start, None).await.unwrap();
        assert_eq!(server.state(), PowerState::Starting);
        assert_eq!(adapter.status(server.id).await.unwrap(), ContainerStatus::Running);
    }

    #[tokio::test]
    async fn done_marker_transitions_starting_to_running() {
        let dir = tempfile::tempdir().unwrap();
        let server = sample_server(dir.path());
        let matcher = DoneMarkerMatcher::compile(&[DoneMarker::Literal { value: "Done".into() }]).unwrap();
        server.set_state(PowerState::Starting);
        server.handle_log_line(LogLine { line: "[server] Done!".into(), stream: wings_adapters::LogStream::Stdout }, &matcher);
        assert_eq!(server.state(), PowerState::Running);
    }

    #[tokio::test]
    async fn concurrent_start_is_rejected_with_zero_timeout_while_locked() {
        let dir = tempfile::tempdir().unwrap();
        let server = sample_server(dir.path());
        let guard = server.power_lock.lock().await;

        let adapter: Arc<dyn ContainerAdapter> = Arc::new(FakeAdapter::default());
        let result = server
            .handle_power_action(adapter, PowerAction::Start, Some(Duration::ZERO))
            .await;
        assert!(matches!(result, Err(EngineError::Locked)));
        drop(guard);
    }

    #[tokio::test]
    async fn kill_rate_limit_swallows_immediate_repeat() {
        let dir = tempfile::tempdir().unwrap();
        let server = sample_server(dir.path());
        let adapter: Arc<dyn ContainerAdapter> = Arc::new(FakeAdapter::default());

        server.handle_power_action(Arc::clone(&adapter), PowerAction::Kill, None).await.unwrap();
        // second kill within the rate-limit window is a no-op, not an error
        server.handle_power_action(adapter, PowerAction::Kill, None).await.unwrap();
    }
}
