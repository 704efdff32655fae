// SPDX-License-Identifier: MIT

//! An in-memory [`ContainerAdapter`] for exercising the power FSM and boot
//! reconciliation without a Docker daemon.

use crate::adapter::{ContainerAdapter, ContainerStatus, LogLineSender, ResourceUsage};
use crate::error::AdapterError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wings_core::{ResourceLimits, ServerConfig, ServerId, StopStrategy};

#[derive(Default)]
pub struct FakeAdapter {
    state: Arc<Mutex<HashMap<ServerId, ContainerStatus>>>,
}

impl FakeAdapter {
    pub fn set_status(&self, server: ServerId, status: ContainerStatus) {
        self.state.lock().insert(server, status);
    }
}

#[async_trait]
impl ContainerAdapter for FakeAdapter {
    async fn create(&self, server: ServerId, _config: &ServerConfig) -> Result<(), AdapterError> {
        self.state.lock().entry(server).or_insert(ContainerStatus::Stopped);
        Ok(())
    }

    async fn destroy(&self, server: ServerId) -> Result<(), AdapterError> {
        self.state.lock().remove(&server);
        Ok(())
    }

    async fn start(&self, server: ServerId) -> Result<(), AdapterError> {
        self.state.lock().insert(server, ContainerStatus::Running);
        Ok(())
    }

    async fn stop(&self, server: ServerId, _strategy: &StopStrategy, _grace_period: Duration) -> Result<(), AdapterError> {
        self.state.lock().insert(server, ContainerStatus::Stopped);
        Ok(())
    }

    async fn kill(&self, server: ServerId) -> Result<(), AdapterError> {
        self.state.lock().insert(server, ContainerStatus::Stopped);
        Ok(())
    }

    async fn attach(&self, _server: ServerId, _sink: LogLineSender, cancel: CancellationToken) -> Result<(), AdapterError> {
        cancel.cancelled().await;
        Ok(())
    }

    async fn detach(&self, _server: ServerId) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn status(&self, server: ServerId) -> Result<ContainerStatus, AdapterError> {
        Ok(self.state.lock().get(&server).copied().unwrap_or(ContainerStatus::NotFound))
    }

    async fn resource_usage(&self, _server: ServerId) -> Result<ResourceUsage, AdapterError> {
        Ok(ResourceUsage::default())
    }

    async fn update_limits(&self, _server: ServerId, _limits: &ResourceLimits) -> Result<(), AdapterError> {
        Ok(())
    }
}
