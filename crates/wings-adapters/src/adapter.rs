// SPDX-License-Identifier: MIT

//! The container-runtime adapter contract (C3).
//!
//! One implementor per runtime; `wings-engine` holds a `dyn ContainerAdapter`
//! and never talks to Docker directly, so the power FSM and the boot
//! reconciliation loop can be exercised against a fake in tests.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use wings_core::{ResourceLimits, ServerConfig, ServerId, StopStrategy};

/// Whether a container exists and, if so, whether it's running.
///
/// Distinguished from a generic error per spec.md §4.6.1 step 4: "if the
/// container does not exist at all (not a generic error), mark offline".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    NotFound,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceUsage {
    pub memory_bytes: u64,
    pub cpu_percent: f64,
    pub disk_bytes: u64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
}

/// A single line of container stdout/stderr, delivered length-delimited
/// into the owning server's log sink pool (spec.md §4.5.3).
#[derive(Debug, Clone)]
pub struct LogLine {
    pub line: String,
    pub stream: LogStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

pub type LogLineSender = tokio::sync::mpsc::Sender<LogLine>;

#[async_trait]
pub trait ContainerAdapter: Send + Sync {
    async fn create(&self, server: ServerId, config: &ServerConfig) -> Result<(), crate::AdapterError>;

    async fn destroy(&self, server: ServerId) -> Result<(), crate::AdapterError>;

    /// Idempotent: a no-op if the container is already running.
    async fn start(&self, server: ServerId) -> Result<(), crate::AdapterError>;

    async fn stop(
        &self,
        server: ServerId,
        strategy: &StopStrategy,
        grace_period: std::time::Duration,
    ) -> Result<(), crate::AdapterError>;

    async fn kill(&self, server: ServerId) -> Result<(), crate::AdapterError>;

    /// Streams stdout/stderr lines into `sink` until the container exits or
    /// `cancel` fires. Returns once either happens.
    async fn attach(
        &self,
        server: ServerId,
        sink: LogLineSender,
        cancel: CancellationToken,
    ) -> Result<(), crate::AdapterError>;

    async fn detach(&self, server: ServerId) -> Result<(), crate::AdapterError>;

    async fn status(&self, server: ServerId) -> Result<ContainerStatus, crate::AdapterError>;

    async fn resource_usage(&self, server: ServerId) -> Result<ResourceUsage, crate::AdapterError>;

    async fn update_limits(
        &self,
        server: ServerId,
        limits: &ResourceLimits,
    ) -> Result<(), crate::AdapterError>;
}
