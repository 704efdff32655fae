// SPDX-License-Identifier: MIT

//! Panel error taxonomy, per spec.md §7's `transient-upstream` /
//! `permanent-upstream` split plus the SFTP credential-check sentinel.

#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("network error talking to the panel: {0}")]
    Network(#[from] reqwest::Error),
    /// 5xx, 429, or a network error — retried with backoff by the caller.
    #[error("transient panel error (status {status}): {body}")]
    Transient { status: u16, body: String },
    /// 4xx other than 429 — never retried.
    #[error("permanent panel error (status {status}): {body}")]
    Permanent { status: u16, body: String },
    /// 401/403 from `/sftp/auth` specifically — distinguished from a generic
    /// permanent error so the SFTP front-end can reply at the SSH layer
    /// instead of a catch-all failure (spec.md §4.7.1 step 3).
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("failed to decode panel response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("panel call cancelled")]
    Cancelled,
}

impl PanelError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PanelError::Transient { .. } | PanelError::Network(_))
    }

    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            PanelError::Transient { status: status.as_u16(), body }
        } else {
            PanelError::Permanent { status: status.as_u16(), body }
        }
    }

    /// Same classification, but 401/403 become the [`PanelError::InvalidCredentials`]
    /// sentinel. Used only by `/sftp/auth`, the one call site that needs to
    /// tell the SSH front-end "bad password" apart from "panel is broken".
    pub(crate) fn from_auth_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return PanelError::InvalidCredentials;
        }
        Self::from_status(status, body)
    }
}
