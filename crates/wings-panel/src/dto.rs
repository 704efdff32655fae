// SPDX-License-Identifier: MIT

//! Wire shapes for the Panel API (spec.md §6). Field sets are deliberately
//! narrow — only what C5/C6/C7/C8 actually consume.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use wings_core::{ServerConfig, ServerId};

#[derive(Debug, Clone, Deserialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerListPage {
    pub data: Vec<ServerSpec>,
    pub meta: PageMeta,
}

/// One server spec as handed out by the Panel, enough to materialize a C5
/// entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSpec {
    pub uuid: ServerId,
    pub settings: ServerConfig,
    #[serde(default)]
    pub is_transferring: bool,
    #[serde(default)]
    pub is_installing: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallScript {
    pub container_image: String,
    pub entrypoint: String,
    pub script: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallStatus {
    pub successful: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reinstall: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferStatus {
    pub successful: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveStatus {
    pub successful: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupUploadUrls {
    pub parts: Vec<String>,
    pub part_size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupCompletion {
    pub successful: bool,
    pub checksum: String,
    pub checksum_type: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<BackupPart>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupPart {
    pub etag: String,
    pub part_number: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreCompletion {
    pub successful: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SftpAuthRequest {
    pub username: String,
    pub password: String,
    pub ip: String,
    pub session_id: String,
    pub client_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SftpAuthResponse {
    pub server: ServerId,
    /// Attributed to every activity record this session emits (spec.md §4.7.3).
    pub user: Uuid,
    pub token: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivitySubmission {
    pub data: Vec<ActivityWire>,
}

/// The Panel's flattened view of [`wings_core::ActivityRecord`].
#[derive(Debug, Clone, Serialize)]
pub struct ActivityWire {
    pub event: String,
    pub server: ServerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<uuid::Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl From<&wings_core::ActivityRecord> for ActivityWire {
    fn from(record: &wings_core::ActivityRecord) -> Self {
        Self {
            event: record.event.clone(),
            server: record.server,
            user: record.user,
            ip: record.ip.map(|ip| ip.to_string()),
            timestamp: record.timestamp,
            metadata: record.metadata.clone().into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetStuckFlags {
    pub successful: bool,
}
