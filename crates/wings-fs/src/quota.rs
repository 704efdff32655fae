// SPDX-License-Identifier: MIT

//! Cached disk-usage tracking, per spec.md §4.4's
//! `has-space-available(check-now)`.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Quota {
    limit_bytes: u64,
    cached_used_bytes: AtomicU64,
}

impl Quota {
    pub fn new(limit_bytes: u64) -> Self {
        Self { limit_bytes, cached_used_bytes: AtomicU64::new(0) }
    }

    /// Invalidate-on-write: bump the cache by `delta` rather than forcing a
    /// full recompute on every write.
    pub fn record_write(&self, delta_bytes: i64) {
        let current = self.cached_used_bytes.load(Ordering::Relaxed);
        let next = current.saturating_add_signed(delta_bytes);
        self.cached_used_bytes.store(next, Ordering::Relaxed);
    }

    pub fn cached_used_bytes(&self) -> u64 {
        self.cached_used_bytes.load(Ordering::Relaxed)
    }

    pub fn set_used_bytes(&self, used_bytes: u64) {
        self.cached_used_bytes.store(used_bytes, Ordering::Relaxed);
    }

    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }

    /// `check_now`: force a fresh walk of `root` rather than trusting the
    /// cache. Run via `spawn_blocking` by the caller — this does
    /// synchronous I/O.
    pub fn recompute(root: &Path) -> std::io::Result<u64> {
        let mut total = 0u64;
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let metadata = entry.symlink_metadata()?;
                if metadata.is_dir() {
                    stack.push(entry.path());
                } else {
                    total = total.saturating_add(metadata.len());
                }
            }
        }
        Ok(total)
    }

    pub fn has_space_available(&self, write_size: u64) -> bool {
        self.cached_used_bytes().saturating_add(write_size) <= self.limit_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_quota_has_space() {
        let quota = Quota::new(1_000);
        assert!(quota.has_space_available(500));
    }

    #[test]
    fn write_past_limit_is_rejected() {
        let quota = Quota::new(1_000);
        quota.set_used_bytes(900);
        assert!(!quota.has_space_available(200));
        assert!(quota.has_space_available(100));
    }

    #[test]
    fn record_write_adjusts_cache_without_recompute() {
        let quota = Quota::new(1_000);
        quota.record_write(300);
        assert_eq!(quota.cached_used_bytes(), 300);
        quota.record_write(-100);
        assert_eq!(quota.cached_used_bytes(), 200);
    }
}
