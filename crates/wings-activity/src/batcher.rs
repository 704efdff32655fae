// SPDX-License-Identifier: MIT

//! The batcher cron (spec.md §4.8.2): every `send_interval`, posts up to
//! `send_count` of the oldest buffered records to the Panel as one batch
//! and deletes exactly those records on success.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wings_core::ActivityRecord;
use wings_panel::PanelClient;
use wings_store::ActivityBuffer;

use crate::error::ActivityError;
use crate::TickOutcome;

pub struct Batcher {
    buffer: Arc<ActivityBuffer>,
    panel: Arc<PanelClient>,
    send_interval: Duration,
    send_count: usize,
    /// Swap-if-unset guard: a tick already in flight makes a re-entrant
    /// call return immediately rather than run concurrently or queue.
    running: AtomicBool,
    shutdown: CancellationToken,
}

impl Batcher {
    pub fn new(
        buffer: Arc<ActivityBuffer>,
        panel: Arc<PanelClient>,
        send_interval: Duration,
        send_count: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self { buffer, panel, send_interval, send_count, running: AtomicBool::new(false), shutdown }
    }

    /// `send_interval` is the cadence `wings-cron` should schedule this job
    /// at; the job body only guards against overlap, it doesn't run its own
    /// timer.
    pub fn send_interval(&self) -> Duration {
        self.send_interval
    }

    /// One guarded attempt. Returns [`TickOutcome::AlreadyRunning`] without
    /// touching the buffer if a previous tick is still in flight — the
    /// caller (`wings-cron`) is the one that logs that at warn, not here.
    pub async fn tick(&self) -> TickOutcome {
        if self.running.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return TickOutcome::AlreadyRunning;
        }
        if let Err(err) = self.drain_once().await {
            warn!(%err, "activity batch submission failed, retaining records for next tick");
        }
        self.running.store(false, Ordering::Release);
        TickOutcome::Completed
    }

    async fn drain_once(&self) -> Result<(), ActivityError> {
        let entries = self.buffer.range(self.send_count)?;
        if entries.is_empty() {
            return Ok(());
        }

        let ids: Vec<u64> = entries.iter().map(|(id, _)| *id).collect();
        let records: Vec<ActivityRecord> = entries.into_iter().map(|(_, record)| record).collect();

        self.panel.submit_activity(&records, &self.shutdown).await?;
        self.buffer.delete_batch(&ids)?;
        info!(count = ids.len(), "submitted activity batch to panel");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wings_core::ServerId;
    use wings_store::Store;

    fn sample() -> ActivityRecord {
        ActivityRecord::new("server:power.start", ServerId::new(), chrono::Utc::now())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submission_leaves_records_buffered() {
        let store = Store::open_temporary().unwrap();
        let buffer = Arc::new(store.activity().unwrap());
        buffer.append(&sample()).unwrap();

        // Unreachable panel host: the paused clock lets the 30s retry budget
        // inside `submit_activity`'s backoff loop elapse instantly.
        let panel = Arc::new(PanelClient::new("http://127.0.0.1:0", "node-1", "token").unwrap());
        let batcher = Batcher::new(buffer.clone(), panel, Duration::from_secs(60), 10, CancellationToken::new());

        let result = batcher.drain_once().await;
        assert!(result.is_err());
        assert_eq!(buffer.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_buffer_is_a_no_op() {
        let store = Store::open_temporary().unwrap();
        let buffer = Arc::new(store.activity().unwrap());
        let panel = Arc::new(PanelClient::new("http://127.0.0.1:0", "node-1", "token").unwrap());
        let batcher = Batcher::new(buffer, panel, Duration::from_secs(60), 10, CancellationToken::new());

        batcher.drain_once().await.unwrap();
    }

    #[tokio::test]
    async fn tick_reports_already_running_without_draining() {
        let store = Store::open_temporary().unwrap();
        let buffer = Arc::new(store.activity().unwrap());
        buffer.append(&sample()).unwrap();
        let panel = Arc::new(PanelClient::new("http://127.0.0.1:0", "node-1", "token").unwrap());
        let batcher = Batcher::new(buffer.clone(), panel, Duration::from_secs(60), 10, CancellationToken::new());
        batcher.running.store(true, Ordering::SeqCst);

        assert_eq!(batcher.tick().await, TickOutcome::AlreadyRunning);
        assert_eq!(buffer.len().unwrap(), 1);
    }
}
