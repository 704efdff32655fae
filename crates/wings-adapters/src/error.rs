// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("container not found")]
    NotFound,
    #[error("adapter operation cancelled")]
    Cancelled,
    #[error("adapter error: {0}")]
    Other(String),
}
