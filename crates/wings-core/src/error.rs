// SPDX-License-Identifier: MIT

//! The shared error taxonomy from spec.md §7.
//!
//! Leaf crates define their own `thiserror` error types for I/O-specific
//! detail; this enum is what crosses crate boundaries into `wings-ssh` and
//! `wings-daemon`, where it is mapped to an SSH status code or an HTTP
//! status respectively.

#[derive(Debug, thiserror::Error)]
pub enum WingsError {
    #[error("not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("quota exceeded")]
    QuotaExceeded,
    #[error("transient upstream error: {0}")]
    TransientUpstream(String),
    #[error("permanent upstream error: {0}")]
    PermanentUpstream(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("path escape")]
    PathEscape,
    #[error("fatal init error: {0}")]
    FatalInit(String),
}

impl WingsError {
    /// `russh_sftp` status code, per spec.md §4.7.2's mapping table.
    /// Extension code 15 is "quota exceeded".
    pub fn sftp_status_code(&self) -> u32 {
        match self {
            WingsError::NotFound => 2,       // SSH_FX_NO_SUCH_FILE
            WingsError::PermissionDenied | WingsError::PathEscape => 3, // SSH_FX_PERMISSION_DENIED
            WingsError::QuotaExceeded => 15, // extension code
            _ => 4,                          // SSH_FX_FAILURE
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, WingsError::TransientUpstream(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_exceeded_maps_to_extension_code_fifteen() {
        assert_eq!(WingsError::QuotaExceeded.sftp_status_code(), 15);
    }

    #[test]
    fn path_escape_maps_to_permission_denied() {
        assert_eq!(WingsError::PathEscape.sftp_status_code(), WingsError::PermissionDenied.sftp_status_code());
    }

    #[test]
    fn only_transient_upstream_is_retryable() {
        assert!(WingsError::TransientUpstream("x".into()).is_retryable());
        assert!(!WingsError::PermanentUpstream("x".into()).is_retryable());
    }
}
