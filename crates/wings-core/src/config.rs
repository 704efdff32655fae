// SPDX-License-Identifier: MIT

//! Server configuration: the data carried in a Panel server spec.

use crate::power::StopStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resource limits enforced by the container runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_bytes: u64,
    pub cpu_shares: u32,
    pub disk_bytes: u64,
    pub io_weight: u32,
}

/// A single done-marker: a literal substring or regex matched against
/// container stdout to decide when `starting` becomes `running`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DoneMarker {
    Literal { value: String },
    Regex { pattern: String },
}

/// The file format a process-configuration edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigFileFormat {
    Raw,
    Json,
    Yaml,
    Ini,
    Properties,
}

/// One rewrite rule applied to a known config file path at start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFileEdit {
    pub path: String,
    pub format: ConfigFileFormat,
    /// `(match, replacement)` pairs. For structured formats, `match` is a
    /// dotted key path; for `Raw`, a regex.
    pub replacements: Vec<(String, String)>,
}

/// Egg-specific process configuration: how to know the server finished
/// booting, and how its config files should be rewritten first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessConfiguration {
    pub done_markers: Vec<DoneMarker>,
    pub file_edits: Vec<ConfigFileEdit>,
}

/// The full server specification as materialized from a Panel server spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub limits: ResourceLimits,
    pub image: String,
    pub env: HashMap<String, String>,
    pub startup_command: String,
    pub stop: StopStrategy,
    pub process: ProcessConfiguration,
    pub suspended: bool,
    pub skip_scripts: bool,
    /// Uid/gid that newly created files in the server's data directory
    /// should be owned by.
    pub uid: u32,
    pub gid: u32,
    /// Seconds to wait after a `stop` before escalating to `kill`.
    #[serde(default = "default_stop_grace_seconds")]
    pub stop_grace_seconds: u64,
    /// Whether an unexpected exit while `running`/`starting` should
    /// automatically re-enqueue a `start`, outside of a cooldown window.
    #[serde(default)]
    pub crash_restart: bool,
}

fn default_stop_grace_seconds() -> u64 {
    30
}
