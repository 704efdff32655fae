// SPDX-License-Identifier: MIT

//! On-disk daemon configuration (`config.toml`), mirroring the teacher's
//! `Config::load` in spirit but sourced from a parsed file rather than
//! fixed XDG paths, since this daemon is provisioned by a Panel rather than
//! run per-user (§3 "Configuration").

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use uuid::Uuid;

use crate::error::DaemonError;

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// This node's identity as known to the Panel.
    pub uuid: Uuid,
    pub token_id: String,
    pub token: String,
    /// Panel base URL, e.g. `https://panel.example.com`.
    pub remote: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub allow_overwriting_custom_ui: bool,
    #[serde(default)]
    pub api: ApiConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: IpAddr,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { host: default_api_host(), port: default_api_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    /// Root directory under which every server's jailed filesystem and the
    /// daemon's own `wings.db`/host key live.
    pub data: PathBuf,
    #[serde(default)]
    pub sftp: SftpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SftpConfig {
    #[serde(default = "default_sftp_port")]
    pub bind_port: u16,
    #[serde(default)]
    pub read_only: bool,
}

impl Default for SftpConfig {
    fn default() -> Self {
        Self { bind_port: default_sftp_port(), read_only: false }
    }
}

fn default_api_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_api_port() -> u16 {
    8080
}

fn default_sftp_port() -> u16 {
    2022
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, DaemonError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn store_path(&self) -> PathBuf {
        self.system.data.join("wings.db")
    }

    pub fn host_key_path(&self) -> PathBuf {
        self.system.data.join(".sftp").join("id_host_key")
    }

    /// Bearer token the Panel's control calls must present, matching
    /// `wings-panel`'s own `node_id.token` header shape so both directions
    /// of the relationship authenticate the same way.
    pub fn control_bearer(&self) -> String {
        format!("{}.{}", self.token_id, self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let toml = r#"
            uuid = "3fa85f64-5717-4562-b3fc-2c963f66afa6"
            token_id = "abc123"
            token = "secret"
            remote = "https://panel.example.com"

            [system]
            data = "/srv/wings"
        "#;
        let config: DaemonConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.system.sftp.bind_port, 2022);
        assert!(!config.debug);
    }

    #[test]
    fn control_bearer_joins_id_and_token() {
        let toml = r#"
            uuid = "3fa85f64-5717-4562-b3fc-2c963f66afa6"
            token_id = "abc123"
            token = "secret"
            remote = "https://panel.example.com"

            [system]
            data = "/srv/wings"
        "#;
        let config: DaemonConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.control_bearer(), "abc123.secret");
    }
}
