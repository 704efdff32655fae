// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum EggConfigError {
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),
    #[error("invalid JSON config file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid INI config file: {0}")]
    Ini(#[from] ini::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
