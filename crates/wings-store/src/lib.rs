// SPDX-License-Identifier: MIT

//! wings-store: the embedded key/value store backing C1.
//!
//! Three `sled` trees live in one `sled::Db`:
//! - `states` — server id → last-observed power state string.
//! - `activity` — append-only buffer of serialized [`ActivityRecord`]s,
//!   keyed by a monotonically increasing big-endian `u64` so range reads
//!   come back in insertion order.
//! - `activity_sftp` — the "sibling table" spec.md §4.8.3 allows for: SFTP
//!   events route here instead of `activity` at ingestion time, so the
//!   batcher cron and the SFTP deduplicator cron each own a disjoint queue
//!   and never race to send the same raw event twice.
//!
//! Any I/O failure surfaces to the caller as [`StoreError`]; per spec.md
//! §4.1 it is the caller's job to decide whether that's fatal (boot) or
//! merely logged (the persistence ticker, activity ingestion).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod activity;
mod snapshot;

pub use activity::ActivityBuffer;
pub use snapshot::StateSnapshot;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("transaction aborted")]
    TransactionAborted,
}

/// Handle to the daemon's durable store (`<root>/wings.db`).
#[derive(Clone)]
pub struct Store {
    db: sled::Db,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    pub fn states(&self) -> Result<StateSnapshot, StoreError> {
        Ok(StateSnapshot::new(self.db.open_tree("states")?))
    }

    pub fn activity(&self) -> Result<ActivityBuffer, StoreError> {
        Ok(ActivityBuffer::new(self.db.open_tree("activity")?))
    }

    /// Sibling buffer for `server:sftp.*` events (spec.md §4.8.3), kept
    /// disjoint from [`Store::activity`] so the batcher and the SFTP
    /// deduplicator cron never scan the same rows.
    pub fn sftp_activity(&self) -> Result<ActivityBuffer, StoreError> {
        Ok(ActivityBuffer::new(self.db.open_tree("activity_sftp")?))
    }

    /// In-memory store for tests; `sled`'s temporary-mode config avoids
    /// touching disk.
    #[cfg(test)]
    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_distinct_trees_from_one_db() {
        let store = Store::open_temporary().unwrap();
        let states = store.states().unwrap();
        let activity = store.activity().unwrap();
        let sftp_activity = store.sftp_activity().unwrap();
        assert!(states.get(&"srv-1".parse().unwrap_or_default()).is_ok());
        assert_eq!(activity.len().unwrap(), 0);
        assert_eq!(sftp_activity.len().unwrap(), 0);
    }
}
