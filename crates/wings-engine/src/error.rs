// SPDX-License-Identifier: MIT

use wings_adapters::AdapterError;
use wings_core::WingsError;
use wings_eggconfig::EggConfigError;
use wings_fs::FsError;
use wings_panel::PanelError;
use wings_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("server not found")]
    NotFound,
    #[error("server is suspended")]
    Suspended,
    #[error("power lock is held by another action")]
    Locked,
    #[error("container adapter error: {0}")]
    Adapter(#[from] AdapterError),
    #[error("panel error: {0}")]
    Panel(#[from] PanelError),
    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),
    #[error("config rewrite error: {0}")]
    EggConfig(#[from] EggConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Maps to the shared taxonomy crossing into `wings-ssh`/`wings-daemon`.
    pub fn to_wings_error(&self) -> WingsError {
        match self {
            EngineError::NotFound => WingsError::NotFound,
            EngineError::Suspended => WingsError::PermissionDenied,
            EngineError::Locked => WingsError::Conflict("power action already in progress".into()),
            EngineError::Fs(FsError::PathEscape) => WingsError::PathEscape,
            EngineError::Fs(FsError::QuotaExceeded) => WingsError::QuotaExceeded,
            EngineError::Fs(FsError::NotFound) => WingsError::NotFound,
            EngineError::Panel(err) if err.is_retryable() => WingsError::TransientUpstream(err.to_string()),
            EngineError::Panel(err) => WingsError::PermanentUpstream(err.to_string()),
            other => WingsError::PermanentUpstream(other.to_string()),
        }
    }
}
