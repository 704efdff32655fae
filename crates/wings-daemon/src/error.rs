// SPDX-License-Identifier: MIT

use thiserror::Error;
use wings_adapters::AdapterError;
use wings_engine::EngineError;
use wings_panel::PanelError;
use wings_ssh::SshError;
use wings_store::StoreError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),
    #[error("panel error: {0}")]
    Panel(#[from] PanelError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("cron scheduler error: {0}")]
    Cron(#[from] wings_cron::CronError),
    #[error("sftp front-end error: {0}")]
    Ssh(#[from] SshError),
    #[error("http listener failed to bind: {0}")]
    Http(std::io::Error),
}
