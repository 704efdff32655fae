// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("path escapes server root")]
    PathEscape,
    #[error("quota exceeded")]
    QuotaExceeded,
    #[error("not found")]
    NotFound,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ownership change failed: {0}")]
    Chown(#[from] nix::Error),
}
