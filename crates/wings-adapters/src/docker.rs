// SPDX-License-Identifier: MIT

//! Docker-backed [`ContainerAdapter`].

use crate::adapter::{ContainerAdapter, ContainerStatus, LogLine, LogLineSender, LogStream, ResourceUsage};
use crate::error::AdapterError;
use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, Config, CreateContainerOptions, KillContainerOptions, LogOutput,
    RemoveContainerOptions, StartContainerOptions, StatsOptions, StopContainerOptions,
    UpdateContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wings_core::{ResourceLimits, ServerConfig, ServerId, StopStrategy};

const SIGKILL: &str = "SIGKILL";

fn container_name(server: ServerId) -> String {
    format!("wings_{}", server.as_uuid().simple())
}

fn is_not_found(err: &BollardError) -> bool {
    matches!(err, BollardError::DockerResponseServerError { status_code, .. } if *status_code == 404)
}

/// `ContainerAdapter` over the local Docker daemon.
///
/// `stdin_senders` holds the write half of each attached container's stdin,
/// populated by [`DockerAdapter::attach`] — the only way to implement
/// [`StopStrategy::Command`], since sending a console command means writing
/// to the *running* process's stdin, not spawning a new exec.
pub struct DockerAdapter {
    docker: Docker,
    stdin_senders: Arc<Mutex<HashMap<ServerId, mpsc::Sender<Vec<u8>>>>>,
}

impl DockerAdapter {
    pub fn connect() -> Result<Self, AdapterError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker, stdin_senders: Arc::new(Mutex::new(HashMap::new())) })
    }

    async fn inspect(&self, server: ServerId) -> Result<Option<bollard::models::ContainerInspectResponse>, AdapterError> {
        match self.docker.inspect_container(&container_name(server), None).await {
            Ok(inspect) => Ok(Some(inspect)),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ContainerAdapter for DockerAdapter {
    async fn create(&self, server: ServerId, config: &ServerConfig) -> Result<(), AdapterError> {
        let name = container_name(server);
        let env: Vec<String> = config.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let host_config = HostConfig {
            memory: Some(config.limits.memory_bytes as i64),
            cpu_shares: Some(config.limits.cpu_shares as i64),
            blkio_weight: Some(config.limits.io_weight as u16),
            ..Default::default()
        };
        let bollard_config = Config {
            image: Some(config.image.clone()),
            env: Some(env),
            cmd: Some(vec!["/bin/sh".to_string(), "-c".to_string(), config.startup_command.clone()]),
            host_config: Some(host_config),
            open_stdin: Some(true),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            user: Some(format!("{}:{}", config.uid, config.gid)),
            ..Default::default()
        };
        self.docker
            .create_container(Some(CreateContainerOptions { name: name.as_str(), platform: None }), bollard_config)
            .await?;
        Ok(())
    }

    async fn destroy(&self, server: ServerId) -> Result<(), AdapterError> {
        self.stdin_senders.lock().remove(&server);
        let name = container_name(server);
        match self
            .docker
            .remove_container(&name, Some(RemoveContainerOptions { force: true, ..Default::default() }))
            .await
        {
            Ok(()) | Err(BollardError::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn start(&self, server: ServerId) -> Result<(), AdapterError> {
        if matches!(self.status(server).await?, ContainerStatus::Running) {
            return Ok(());
        }
        let name = container_name(server);
        self.docker.start_container(&name, None::<StartContainerOptions<String>>).await?;
        Ok(())
    }

    async fn stop(
        &self,
        server: ServerId,
        strategy: &StopStrategy,
        grace_period: Duration,
    ) -> Result<(), AdapterError> {
        let name = container_name(server);
        match strategy {
            StopStrategy::Native => {
                self.docker
                    .stop_container(
                        &name,
                        Some(StopContainerOptions { t: grace_period.as_secs() as i64 }),
                    )
                    .await?;
            }
            StopStrategy::Signal { value } => {
                self.docker
                    .kill_container(&name, Some(KillContainerOptions { signal: value.clone() }))
                    .await?;
            }
            StopStrategy::Command { value } => {
                let sender = self.stdin_senders.lock().get(&server).cloned();
                match sender {
                    Some(sender) => {
                        let mut line = value.clone().into_bytes();
                        line.push(b'\n');
                        sender
                            .send(line)
                            .await
                            .map_err(|_| AdapterError::Other("stdin channel closed".into()))?;
                    }
                    None => {
                        tracing::warn!(server = %server, "no attached stdin for command stop, falling back to native");
                        self.docker
                            .stop_container(
                                &name,
                                Some(StopContainerOptions { t: grace_period.as_secs() as i64 }),
                            )
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn kill(&self, server: ServerId) -> Result<(), AdapterError> {
        let name = container_name(server);
        self.docker
            .kill_container(&name, Some(KillContainerOptions { signal: SIGKILL.to_string() }))
            .await?;
        Ok(())
    }

    async fn attach(
        &self,
        server: ServerId,
        sink: LogLineSender,
        cancel: CancellationToken,
    ) -> Result<(), AdapterError> {
        let name = container_name(server);
        let results = self
            .docker
            .attach_container::<String>(
                &name,
                Some(AttachContainerOptions {
                    stdin: Some(true),
                    stdout: Some(true),
                    stderr: Some(true),
                    stream: Some(true),
                    logs: Some(false),
                    ..Default::default()
                }),
            )
            .await?;
        let mut output = results.output;
        let mut input = results.input;

        let (stdin_tx, mut stdin_rx) = mpsc::channel::<Vec<u8>>(16);
        self.stdin_senders.lock().insert(server, stdin_tx);

        let mut stdout_buf = String::new();
        let mut stderr_buf = String::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                bytes = stdin_rx.recv() => {
                    match bytes {
                        Some(bytes) => { let _ = input.write_all(&bytes).await; let _ = input.flush().await; }
                        None => {}
                    }
                }
                frame = output.next() => {
                    match frame {
                        Some(Ok(LogOutput::StdOut { message })) => {
                            flush_lines(&mut stdout_buf, &message, LogStream::Stdout, &sink).await;
                        }
                        Some(Ok(LogOutput::StdErr { message })) => {
                            flush_lines(&mut stderr_buf, &message, LogStream::Stderr, &sink).await;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => return Err(err.into()),
                        None => break,
                    }
                }
            }
        }

        self.stdin_senders.lock().remove(&server);
        Ok(())
    }

    async fn detach(&self, server: ServerId) -> Result<(), AdapterError> {
        self.stdin_senders.lock().remove(&server);
        Ok(())
    }

    async fn status(&self, server: ServerId) -> Result<ContainerStatus, AdapterError> {
        match self.inspect(server).await? {
            None => Ok(ContainerStatus::NotFound),
            Some(inspect) => {
                let running = inspect.state.and_then(|s| s.running).unwrap_or(false);
                Ok(if running { ContainerStatus::Running } else { ContainerStatus::Stopped })
            }
        }
    }

    async fn resource_usage(&self, server: ServerId) -> Result<ResourceUsage, AdapterError> {
        let name = container_name(server);
        let mut stream = self.docker.stats(&name, Some(StatsOptions { stream: false, one_shot: true }));
        let stats = stream
            .next()
            .await
            .ok_or(AdapterError::NotFound)?
            .map_err(AdapterError::from)?;

        let memory_bytes = stats.memory_stats.usage.unwrap_or(0);
        let cpu_delta = stats.cpu_stats.cpu_usage.total_usage as f64
            - stats.precpu_stats.cpu_usage.total_usage as f64;
        let system_delta = stats.cpu_stats.system_cpu_usage.unwrap_or(0) as f64
            - stats.precpu_stats.system_cpu_usage.unwrap_or(0) as f64;
        let online_cpus = stats.cpu_stats.online_cpus.unwrap_or(1).max(1) as f64;
        let cpu_percent = if system_delta > 0.0 && cpu_delta > 0.0 {
            (cpu_delta / system_delta) * online_cpus * 100.0
        } else {
            0.0
        };

        let (rx, tx) = stats
            .networks
            .unwrap_or_default()
            .values()
            .fold((0u64, 0u64), |(rx, tx), n| (rx + n.rx_bytes, tx + n.tx_bytes));

        Ok(ResourceUsage {
            memory_bytes,
            cpu_percent,
            disk_bytes: 0,
            network_rx_bytes: rx,
            network_tx_bytes: tx,
        })
    }

    async fn update_limits(&self, server: ServerId, limits: &ResourceLimits) -> Result<(), AdapterError> {
        let name = container_name(server);
        self.docker
            .update_container(
                &name,
                UpdateContainerOptions::<String> {
                    memory: Some(limits.memory_bytes as i64),
                    cpu_shares: Some(limits.cpu_shares as i64),
                    blkio_weight: Some(limits.io_weight as u16),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }
}

async fn flush_lines(buf: &mut String, message: &[u8], stream: LogStream, sink: &LogLineSender) {
    buf.push_str(&String::from_utf8_lossy(message));
    while let Some(pos) = buf.find('\n') {
        let line: String = buf.drain(..=pos).collect();
        let line = line.trim_end_matches(['\n', '\r']).to_string();
        let _ = sink.send(LogLine { line, stream }).await;
    }
}
