// SPDX-License-Identifier: MIT

//! wings-adapters: the container-runtime adapter (C3).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod adapter;
mod docker;
mod error;

pub use adapter::{ContainerAdapter, ContainerStatus, LogLine, LogLineSender, LogStream, ResourceUsage};
pub use docker::DockerAdapter;
pub use error::AdapterError;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

#[cfg(test)]
mod tests {
    use super::fake::FakeAdapter;
    use super::*;
    use wings_core::{ServerConfig, ServerId};

    fn config() -> ServerConfig {
        ServerConfig {
            limits: wings_core::ResourceLimits { memory_bytes: 1 << 20, cpu_shares: 100, disk_bytes: 1 << 30, io_weight: 100 },
            image: "alpine:latest".into(),
            env: Default::default(),
            startup_command: "echo hi".into(),
            stop: wings_core::StopStrategy::Native,
            process: Default::default(),
            suspended: false,
            skip_scripts: false,
            uid: 1000,
            gid: 1000,
        }
    }

    #[tokio::test]
    async fn start_is_idempotent_when_already_running() {
        let adapter = FakeAdapter::default();
        let server = ServerId::new();
        adapter.create(server, &config()).await.unwrap();
        adapter.start(server).await.unwrap();
        adapter.start(server).await.unwrap();
        assert_eq!(adapter.status(server).await.unwrap(), ContainerStatus::Running);
    }

    #[tokio::test]
    async fn status_reports_not_found_before_create() {
        let adapter = FakeAdapter::default();
        let server = ServerId::new();
        assert_eq!(adapter.status(server).await.unwrap(), ContainerStatus::NotFound);
    }
}
