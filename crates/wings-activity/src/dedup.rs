// SPDX-License-Identifier: MIT

//! The SFTP deduplicator cron (spec.md §4.8.3): groups buffered
//! `server:sftp.*` records by `(event, user, server, ip, minute_bucket)`,
//! unions their `files` metadata, and submits one synthesized record per
//! group instead of one per raw event.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wings_core::{ActivityRecord, FileEntry, ServerId};
use wings_panel::PanelClient;
use wings_store::ActivityBuffer;

use crate::error::ActivityError;
use crate::TickOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    event: String,
    user: Option<uuid::Uuid>,
    server: ServerId,
    ip: Option<IpAddr>,
    minute: DateTime<Utc>,
}

struct Group {
    ids: Vec<u64>,
    earliest: DateTime<Utc>,
    files: Vec<FileEntry>,
}

pub struct SftpDeduplicator {
    buffer: Arc<ActivityBuffer>,
    panel: Arc<PanelClient>,
    send_interval: Duration,
    scan_limit: usize,
    running: AtomicBool,
    shutdown: CancellationToken,
}

impl SftpDeduplicator {
    pub fn new(
        buffer: Arc<ActivityBuffer>,
        panel: Arc<PanelClient>,
        send_interval: Duration,
        scan_limit: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self { buffer, panel, send_interval, scan_limit, running: AtomicBool::new(false), shutdown }
    }

    pub fn send_interval(&self) -> Duration {
        self.send_interval
    }

    /// One guarded attempt: returns `AlreadyRunning` without touching the
    /// buffer if a previous tick is still in flight.
    pub async fn tick(&self) -> TickOutcome {
        if self.running.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return TickOutcome::AlreadyRunning;
        }
        if let Err(err) = self.drain_once().await {
            warn!(%err, "sftp activity dedup submission failed, retaining records for next tick");
        }
        self.running.store(false, Ordering::Release);
        TickOutcome::Completed
    }

    async fn drain_once(&self) -> Result<(), ActivityError> {
        let rows = self.buffer.range(self.scan_limit)?;
        if rows.is_empty() {
            return Ok(());
        }

        let mut groups: HashMap<GroupKey, Group> = HashMap::new();
        for (id, record) in rows {
            let key = GroupKey {
                event: record.event.clone(),
                user: record.user,
                server: record.server,
                ip: record.ip,
                minute: record.minute_bucket(),
            };
            let files = record.files()?.unwrap_or_default();
            let entry = groups.entry(key).or_insert_with(|| Group { ids: Vec::new(), earliest: record.timestamp, files: Vec::new() });
            entry.ids.push(id);
            if record.timestamp < entry.earliest {
                entry.earliest = record.timestamp;
            }
            for file in files {
                entry.files.push(file);
            }
        }

        let mut synthesized = Vec::with_capacity(groups.len());
        let mut consumed_ids = Vec::new();
        for (key, group) in &groups {
            let mut record = ActivityRecord::new(key.event.clone(), key.server, group.earliest);
            if let Some(user) = key.user {
                record = record.user(user);
            }
            if let Some(ip) = key.ip {
                record = record.ip(ip);
            }
            if !group.files.is_empty() {
                record = record.with_files(group.files.clone());
            }
            synthesized.push(record);
            consumed_ids.extend(group.ids.iter().copied());
        }

        self.panel.submit_activity(&synthesized, &self.shutdown).await?;
        self.buffer.delete_batch(&consumed_ids)?;
        info!(groups = synthesized.len(), raw = consumed_ids.len(), "submitted deduplicated sftp activity");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(event: &str, server: ServerId, ts: DateTime<Utc>, path: &str) -> ActivityRecord {
        ActivityRecord::new(event, server, ts).with_files(vec![FileEntry::Path(path.to_string())])
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submission_leaves_records_buffered() {
        let store = wings_store::Store::open_temporary().unwrap();
        let buffer = Arc::new(store.sftp_activity().unwrap());
        let server = ServerId::new();
        buffer.append(&sample("server:sftp.write", server, Utc::now(), "/a.txt")).unwrap();

        let panel = Arc::new(PanelClient::new("http://127.0.0.1:0", "node-1", "token").unwrap());
        let dedup = SftpDeduplicator::new(buffer.clone(), panel, Duration::from_secs(60), 100, CancellationToken::new());

        assert!(dedup.drain_once().await.is_err());
        assert_eq!(buffer.len().unwrap(), 1);
    }

    #[test]
    fn groups_same_minute_writes_and_unions_files() {
        let server = ServerId::new();
        let ts = Utc::now();
        let a = sample("server:sftp.write", server, ts, "/a.txt");
        let b = sample("server:sftp.write", server, ts, "/b.txt");

        let key_a = GroupKey { event: a.event.clone(), user: a.user, server: a.server, ip: a.ip, minute: a.minute_bucket() };
        let key_b = GroupKey { event: b.event.clone(), user: b.user, server: b.server, ip: b.ip, minute: b.minute_bucket() };
        assert_eq!(key_a, key_b);
    }

    #[tokio::test]
    async fn tick_reports_already_running_without_draining() {
        let store = wings_store::Store::open_temporary().unwrap();
        let buffer = Arc::new(store.sftp_activity().unwrap());
        buffer.append(&sample("server:sftp.write", ServerId::new(), Utc::now(), "/a.txt")).unwrap();
        let panel = Arc::new(PanelClient::new("http://127.0.0.1:0", "node-1", "token").unwrap());
        let dedup = SftpDeduplicator::new(buffer.clone(), panel, Duration::from_secs(60), 100, CancellationToken::new());
        dedup.running.store(true, Ordering::SeqCst);

        assert_eq!(dedup.tick().await, TickOutcome::AlreadyRunning);
        assert_eq!(buffer.len().unwrap(), 1);
    }

    #[test]
    fn distinct_events_do_not_group() {
        let server = ServerId::new();
        let ts = Utc::now();
        let a = sample("server:sftp.write", server, ts, "/a.txt");
        let b = sample("server:sftp.read", server, ts, "/a.txt");

        let key_a = GroupKey { event: a.event.clone(), user: a.user, server: a.server, ip: a.ip, minute: a.minute_bucket() };
        let key_b = GroupKey { event: b.event.clone(), user: b.user, server: b.server, ip: b.ip, minute: b.minute_bucket() };
        assert_ne!(key_a, key_b);
    }
}
