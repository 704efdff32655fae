// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum SshError {
    #[error("host key I/O error: {0}")]
    HostKeyIo(#[from] std::io::Error),
    #[error("host key generation failed: {0}")]
    HostKeyGen(#[from] rsa::Error),
    #[error("host key encoding error: {0}")]
    HostKeyEncoding(#[from] russh::keys::ssh_key::Error),
    #[error("malformed username, expected `<name>.<8-hex>`")]
    InvalidUsername,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("operation not permitted")]
    PermissionDenied,
    #[error("server is suspended")]
    Suspended,
    #[error("read-only mode: operation not supported")]
    OperationUnsupported,
    #[error("filesystem error: {0}")]
    Fs(#[from] wings_fs::FsError),
    #[error("panel error: {0}")]
    Panel(#[from] wings_panel::PanelError),
    #[error("ssh protocol error: {0}")]
    Protocol(#[from] russh::Error),
}

impl SshError {
    pub fn to_wings_error(&self) -> wings_core::WingsError {
        match self {
            SshError::InvalidCredentials => wings_core::WingsError::InvalidCredentials,
            SshError::PermissionDenied | SshError::Suspended => wings_core::WingsError::PermissionDenied,
            SshError::OperationUnsupported => wings_core::WingsError::Conflict("op-unsupported".to_string()),
            SshError::Fs(wings_fs::FsError::NotFound) => wings_core::WingsError::NotFound,
            SshError::Fs(wings_fs::FsError::PathEscape) => wings_core::WingsError::PathEscape,
            SshError::Fs(wings_fs::FsError::QuotaExceeded) => wings_core::WingsError::QuotaExceeded,
            SshError::Fs(_) => wings_core::WingsError::PermanentUpstream("filesystem error".to_string()),
            SshError::Panel(err) if err.is_retryable() => wings_core::WingsError::TransientUpstream(err.to_string()),
            SshError::Panel(err) => wings_core::WingsError::PermanentUpstream(err.to_string()),
            SshError::HostKeyIo(_) | SshError::HostKeyGen(_) | SshError::HostKeyEncoding(_) | SshError::InvalidUsername => {
                wings_core::WingsError::FatalInit("sftp front-end failed to start".to_string())
            }
            SshError::Protocol(_) => wings_core::WingsError::TransientUpstream("ssh protocol error".to_string()),
        }
    }
}
