// SPDX-License-Identifier: MIT

//! Synchronous ingestion (spec.md §4.8.1): every caller-side audit point
//! appends directly to the durable buffer. A write failure is logged and
//! discarded — the pipeline tolerates loss on the write side, but never
//! double-counts, since only a successful batch submission ever deletes.
//!
//! SFTP events route to a sibling buffer (spec.md §4.8.3) instead of the
//! general one, so the batcher cron and the SFTP deduplicator cron each
//! own a disjoint queue.

use tracing::warn;
use wings_core::ActivityRecord;
use wings_store::ActivityBuffer;

/// Appends `record` to `general` or `sftp` depending on its event prefix,
/// swallowing and logging any store failure.
pub fn ingest(general: &ActivityBuffer, sftp: &ActivityBuffer, record: &ActivityRecord) {
    let buffer = if record.is_sftp_event() { sftp } else { general };
    if let Err(err) = buffer.append(record) {
        warn!(event = %record.event, server = %record.server, %err, "failed to persist activity record");
    }
}
