// SPDX-License-Identifier: MIT

//! The `activity` tree: an append-only buffer of [`ActivityRecord`]s.
//!
//! Two independent crons drain this buffer (spec.md §4.8.2 batches raw
//! records to the Panel, §4.8.3 dedups SFTP events first) and both rely on
//! the same contract: read up to N oldest records, submit, and only on
//! success delete exactly the ids that were read. A submission failure must
//! leave the record count unchanged so the next tick retries the same rows.

use crate::StoreError;
use wings_core::ActivityRecord;

/// Handle to the persisted activity buffer tree.
pub struct ActivityBuffer {
    tree: sled::Tree,
}

impl ActivityBuffer {
    pub(crate) fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }

    /// Append a record, returning the big-endian `u64` key it was stored
    /// under. `sled::Tree::generate_id` is monotonically increasing for the
    /// lifetime of the backing `Db`, which is all the ordering guarantee a
    /// single-writer buffer needs.
    pub fn append(&self, record: &ActivityRecord) -> Result<u64, StoreError> {
        let id = self.tree.generate_id()?;
        let value = serde_json::to_vec(record)?;
        self.tree.insert(id.to_be_bytes(), value)?;
        Ok(id)
    }

    /// Read up to `limit` of the oldest records still buffered.
    pub fn range(&self, limit: usize) -> Result<Vec<(u64, ActivityRecord)>, StoreError> {
        let mut out = Vec::with_capacity(limit.min(64));
        for entry in self.tree.iter().take(limit) {
            let (key, value) = entry?;
            let id = u64::from_be_bytes(key.as_ref().try_into().unwrap_or_default());
            let record: ActivityRecord = serde_json::from_slice(&value)?;
            out.push((id, record));
        }
        Ok(out)
    }

    /// Delete exactly the given ids, atomically. Used after a successful
    /// Panel submission so a mid-batch crash can't silently drop records.
    pub fn delete_batch(&self, ids: &[u64]) -> Result<(), StoreError> {
        self.tree
            .transaction(|tx| {
                for id in ids {
                    tx.remove(&id.to_be_bytes())?;
                }
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<sled::Error>| match e {
                sled::transaction::TransactionError::Abort(inner) => StoreError::Sled(inner),
                sled::transaction::TransactionError::Storage(inner) => StoreError::Sled(inner),
            })?;
        self.tree.flush()?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.tree.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.tree.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use wings_core::ServerId;

    fn sample(event: &str) -> ActivityRecord {
        ActivityRecord::new(event, ServerId::new(), chrono::Utc::now())
    }

    #[test]
    fn append_then_range_returns_insertion_order() {
        let store = Store::open_temporary().unwrap();
        let buffer = store.activity().unwrap();
        buffer.append(&sample("server:console.command")).unwrap();
        buffer.append(&sample("server:power.start")).unwrap();
        buffer.append(&sample("server:power.stop")).unwrap();

        let rows = buffer.range(10).unwrap();
        let events: Vec<&str> = rows.iter().map(|(_, r)| r.event.as_str()).collect();
        assert_eq!(
            events,
            vec!["server:console.command", "server:power.start", "server:power.stop"]
        );
    }

    #[test]
    fn range_respects_limit() {
        let store = Store::open_temporary().unwrap();
        let buffer = store.activity().unwrap();
        for _ in 0..5 {
            buffer.append(&sample("server:console.command")).unwrap();
        }
        assert_eq!(buffer.range(2).unwrap().len(), 2);
    }

    #[test]
    fn delete_batch_removes_exactly_those_ids_leaves_others() {
        let store = Store::open_temporary().unwrap();
        let buffer = store.activity().unwrap();
        let a = buffer.append(&sample("server:power.start")).unwrap();
        let b = buffer.append(&sample("server:power.stop")).unwrap();
        let c = buffer.append(&sample("server:power.kill")).unwrap();

        buffer.delete_batch(&[a, c]).unwrap();

        let remaining = buffer.range(10).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, b);
    }

    #[test]
    fn failed_submission_leaves_count_unchanged() {
        let store = Store::open_temporary().unwrap();
        let buffer = store.activity().unwrap();
        buffer.append(&sample("server:power.start")).unwrap();
        buffer.append(&sample("server:power.stop")).unwrap();

        // Simulate "read, then the submit fails" — no delete_batch call.
        let _rows = buffer.range(10).unwrap();
        assert_eq!(buffer.len().unwrap(), 2);
    }

    #[test]
    fn empty_buffer_reports_zero_len() {
        let store = Store::open_temporary().unwrap();
        let buffer = store.activity().unwrap();
        assert_eq!(buffer.len().unwrap(), 0);
        assert!(buffer.is_empty().unwrap());
    }
}
