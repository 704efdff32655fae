// SPDX-License-Identifier: MIT

//! Activity record: the event taxonomy persisted by C1 and drained upstream
//! by the C8 pipeline.

use crate::id::ServerId;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// One entry in an activity record's `files` metadata key.
///
/// Duck-typed per spec.md §9: elements are either a bare path string or a
/// `{from, to}` rename pair. Validated on serialization rather than at
/// construction time so callers can build metadata incrementally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileEntry {
    Path(String),
    Rename { from: String, to: String },
}

/// A single durable event: an SFTP operation, a power action, a console
/// command, etc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Dotted taxonomy, e.g. `server:sftp.write`, `server:power.start`.
    pub event: String,
    pub server: ServerId,
    pub user: Option<uuid::Uuid>,
    pub ip: Option<IpAddr>,
    pub timestamp: DateTime<Utc>,
    /// Opaque metadata map. The conventional `files` key, when present, must
    /// decode as `Vec<FileEntry>` — see [`ActivityRecord::files`].
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ActivityRecord {
    pub fn new(event: impl Into<String>, server: ServerId, timestamp: DateTime<Utc>) -> Self {
        Self {
            event: event.into(),
            server,
            user: None,
            ip: None,
            timestamp,
            metadata: serde_json::Map::new(),
        }
    }

    crate::setters! {
        option {
            user: uuid::Uuid,
            ip: IpAddr,
        }
    }

    pub fn with_files(mut self, files: Vec<FileEntry>) -> Self {
        self.metadata.insert(
            "files".to_string(),
            serde_json::to_value(files).expect("FileEntry always serializes"),
        );
        self
    }

    /// Parse the conventional `files` key, if present.
    ///
    /// Returns an error if the key exists but isn't a `Vec<FileEntry>` shape
    /// — callers use this at the SFTP-dedup boundary, where a malformed
    /// `files` key would otherwise silently drop an audit trail.
    pub fn files(&self) -> Result<Option<Vec<FileEntry>>, serde_json::Error> {
        match self.metadata.get("files") {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// True if `event` starts with the SFTP taxonomy prefix the
    /// deduplicator groups on.
    pub fn is_sftp_event(&self) -> bool {
        self.event.starts_with("server:sftp.")
    }

    /// Truncate `timestamp` to the minute, the deduplicator's group key
    /// granularity.
    pub fn minute_bucket(&self) -> DateTime<Utc> {
        self.timestamp
            .date_naive()
            .and_hms_opt(self.timestamp.time().hour(), self.timestamp.time().minute(), 0)
            .map(|naive| naive.and_utc())
            .unwrap_or(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_round_trips_mixed_entries() {
        let server = ServerId::new();
        let record = ActivityRecord::new("server:sftp.rename", server, Utc::now()).with_files(vec![
            FileEntry::Path("/foo.txt".to_string()),
            FileEntry::Rename { from: "/a".to_string(), to: "/b".to_string() },
        ]);
        let files = record.files().unwrap().unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn missing_files_key_is_none() {
        let record = ActivityRecord::new("server:power.start", ServerId::new(), Utc::now());
        assert!(record.files().unwrap().is_none());
    }

    #[test]
    fn is_sftp_event_checks_prefix() {
        let server = ServerId::new();
        assert!(ActivityRecord::new("server:sftp.write", server, Utc::now()).is_sftp_event());
        assert!(!ActivityRecord::new("server:power.start", server, Utc::now()).is_sftp_event());
    }

    #[test]
    fn minute_bucket_truncates_seconds() {
        let ts = Utc::now();
        let record = ActivityRecord::new("server:sftp.write", ServerId::new(), ts);
        assert_eq!(record.minute_bucket().second(), 0);
    }
}
