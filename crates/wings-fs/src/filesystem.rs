// SPDX-License-Identifier: MIT

//! `ServerFilesystem`: the jailed view of one server's data directory
//! (spec.md §4.4).

use crate::error::FsError;
use crate::path::safe_path;
use crate::quota::Quota;
use nix::unistd::{chown, fchownat, FchownatFlags, Gid, Uid};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::os::unix::fs::{symlink as unix_symlink, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Created,
    Updated,
}

#[derive(Debug, Clone)]
pub struct FileStat {
    pub len: u64,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub mode: u32,
    pub modified: SystemTime,
}

#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub name: String,
    pub stat: FileStat,
}

pub struct ServerFilesystem {
    root: PathBuf,
    uid: u32,
    gid: u32,
    quota: Quota,
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl ServerFilesystem {
    pub fn new(root: impl Into<PathBuf>, uid: u32, gid: u32, quota_bytes: u64) -> Self {
        Self {
            root: root.into(),
            uid,
            gid,
            quota: Quota::new(quota_bytes),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, requested: &str) -> Result<PathBuf, FsError> {
        safe_path(&self.root, requested)
    }

    pub fn has_space_available(&self, write_size: u64) -> bool {
        self.quota.has_space_available(write_size)
    }

    /// `check_now`: force a fresh recomputation rather than trusting the
    /// cache, as the periodic recompute and post-large-write paths do.
    pub async fn recompute_quota(&self) -> Result<u64, FsError> {
        let root = self.root.clone();
        let used = tokio::task::spawn_blocking(move || Quota::recompute(&root))
            .await
            .map_err(|e| FsError::Io(std::io::Error::other(e.to_string())))??;
        self.quota.set_used_bytes(used);
        Ok(used)
    }

    pub async fn ensure_root_exists(&self) -> Result<(), FsError> {
        tokio::fs::create_dir_all(&self.root).await?;
        self.chown_one(&self.root, false)?;
        Ok(())
    }

    async fn lock_for(&self, path: &Path) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock();
            locks.entry(path.to_path_buf()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        mutex.lock_owned().await
    }

    pub async fn read(&self, relative: &str) -> Result<Vec<u8>, FsError> {
        let path = self.resolve(relative)?;
        Ok(tokio::fs::read(&path).await?)
    }

    pub async fn write(&self, relative: &str, data: &[u8]) -> Result<WriteKind, FsError> {
        let path = self.resolve(relative)?;
        let _guard = self.lock_for(&path).await;

        let existed = tokio::fs::metadata(&path).await.is_ok();
        let previous_len = if existed { tokio::fs::metadata(&path).await?.len() } else { 0 };

        let added_bytes = (data.len() as u64).saturating_sub(previous_len);
        if !self.has_space_available(added_bytes) {
            return Err(FsError::QuotaExceeded);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        self.quota.record_write(data.len() as i64 - previous_len as i64);

        if !existed {
            self.chown_one(&path, false)?;
            Ok(WriteKind::Created)
        } else {
            Ok(WriteKind::Updated)
        }
    }

    pub async fn list(&self, relative: &str) -> Result<Vec<DirEntryInfo>, FsError> {
        let path = self.resolve(relative)?;
        let mut entries = tokio::fs::read_dir(&path).await?;
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let stat = stat_path(&entry.path())?;
            out.push(DirEntryInfo { name: entry.file_name().to_string_lossy().into_owned(), stat });
        }
        Ok(out)
    }

    pub async fn stat(&self, relative: &str) -> Result<FileStat, FsError> {
        let path = self.resolve(relative)?;
        stat_path(&path)
    }

    /// Masks `mode` to its permission bits; directories are forced to
    /// 0755; a zero mode defaults to 0644 (spec.md §4.7.2).
    pub async fn setstat(&self, relative: &str, mode: u32) -> Result<(), FsError> {
        let path = self.resolve(relative)?;
        let is_dir = tokio::fs::metadata(&path).await?.is_dir();
        let normalized = normalize_mode(mode, is_dir);
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(normalized)).await?;
        Ok(())
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;
        let _guard = self.lock_for(&to_path).await;
        tokio::fs::rename(&from_path, &to_path).await?;
        let is_dir = tokio::fs::metadata(&to_path).await?.is_dir();
        self.chown_one(&to_path, is_dir)?;
        Ok(())
    }

    pub async fn mkdir(&self, relative: &str) -> Result<(), FsError> {
        let path = self.resolve(relative)?;
        tokio::fs::create_dir(&path).await?;
        self.chown_one(&path, true)?;
        Ok(())
    }

    /// Recursive, per spec.md §4.7.2.
    pub async fn rmdir(&self, relative: &str) -> Result<(), FsError> {
        let path = self.resolve(relative)?;
        let freed = tokio::task::spawn_blocking({
            let path = path.clone();
            move || Quota::recompute(&path)
        })
        .await
        .map_err(|e| FsError::Io(std::io::Error::other(e.to_string())))??;
        tokio::fs::remove_dir_all(&path).await?;
        self.quota.record_write(-(freed as i64));
        Ok(())
    }

    pub async fn remove(&self, relative: &str) -> Result<(), FsError> {
        let path = self.resolve(relative)?;
        let freed = tokio::fs::metadata(&path).await?.len();
        tokio::fs::remove_file(&path).await?;
        self.quota.record_write(-(freed as i64));
        Ok(())
    }

    pub async fn symlink(&self, target: &str, link_relative: &str) -> Result<(), FsError> {
        let link_path = self.resolve(link_relative)?;
        let target = target.to_string();
        let link_for_blocking = link_path.clone();
        tokio::task::spawn_blocking(move || unix_symlink(&target, &link_for_blocking))
            .await
            .map_err(|e| FsError::Io(std::io::Error::other(e.to_string())))??;
        self.lchown_one(&link_path)?;
        Ok(())
    }

    /// `chown("/")` walks the whole tree; called on server filesystem
    /// provisioning and after a uid/gid change.
    pub fn chown_recursive(&self, relative: &str) -> Result<(), FsError> {
        let path = self.resolve(relative)?;
        let mut stack = vec![path];
        while let Some(entry) = stack.pop() {
            let metadata = std::fs::symlink_metadata(&entry)?;
            if metadata.file_type().is_symlink() {
                self.lchown_one(&entry)?;
                continue;
            }
            self.chown_one(&entry, metadata.is_dir())?;
            if metadata.is_dir() {
                for child in std::fs::read_dir(&entry)? {
                    stack.push(child?.path());
                }
            }
        }
        Ok(())
    }

    fn chown_one(&self, path: &Path, _is_dir: bool) -> Result<(), FsError> {
        chown(path, Some(Uid::from_raw(self.uid)), Some(Gid::from_raw(self.gid)))?;
        Ok(())
    }

    fn lchown_one(&self, path: &Path) -> Result<(), FsError> {
        fchownat(
            None,
            path,
            Some(Uid::from_raw(self.uid)),
            Some(Gid::from_raw(self.gid)),
            FchownatFlags::NoFollowSymlink,
        )?;
        Ok(())
    }

}

fn normalize_mode(mode: u32, is_dir: bool) -> u32 {
    let masked = mode & 0o777;
    if is_dir {
        0o755
    } else if masked == 0 {
        0o644
    } else {
        masked
    }
}

fn stat_path(path: &Path) -> Result<FileStat, FsError> {
    let metadata = std::fs::symlink_metadata(path)?;
    Ok(FileStat {
        len: metadata.len(),
        is_dir: metadata.is_dir(),
        is_symlink: metadata.file_type().is_symlink(),
        mode: metadata.permissions().mode() & 0o777,
        modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fs_at(root: &Path) -> ServerFilesystem {
        ServerFilesystem::new(root.to_path_buf(), nix::unistd::getuid().as_raw(), nix::unistd::getgid().as_raw(), 1_000_000)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let root = tempdir().unwrap();
        let filesystem = fs_at(root.path());
        let kind = filesystem.write("hello.txt", b"hi").await.unwrap();
        assert_eq!(kind, WriteKind::Created);
        assert_eq!(filesystem.read("hello.txt").await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn second_write_to_same_path_is_an_update() {
        let root = tempdir().unwrap();
        let filesystem = fs_at(root.path());
        filesystem.write("hello.txt", b"hi").await.unwrap();
        let kind = filesystem.write("hello.txt", b"bye").await.unwrap();
        assert_eq!(kind, WriteKind::Updated);
    }

    #[tokio::test]
    async fn write_exceeding_quota_fails() {
        let root = tempdir().unwrap();
        let filesystem = ServerFilesystem::new(
            root.path().to_path_buf(),
            nix::unistd::getuid().as_raw(),
            nix::unistd::getgid().as_raw(),
            4,
        );
        let err = filesystem.write("big.txt", b"too much data").await.unwrap_err();
        assert!(matches!(err, FsError::QuotaExceeded));
    }

    #[tokio::test]
    async fn rmdir_is_recursive_and_frees_quota() {
        let root = tempdir().unwrap();
        let filesystem = fs_at(root.path());
        filesystem.mkdir("dir").await.unwrap();
        filesystem.write("dir/a.txt", b"1234").await.unwrap();
        filesystem.recompute_quota().await.unwrap();
        assert!(filesystem.quota.cached_used_bytes() >= 4);
        filesystem.rmdir("dir").await.unwrap();
        assert!(!root.path().join("dir").exists());
    }

    #[test]
    fn setstat_mode_normalization() {
        assert_eq!(normalize_mode(0, false), 0o644);
        assert_eq!(normalize_mode(0, true), 0o755);
        assert_eq!(normalize_mode(0o600, false), 0o600);
        assert_eq!(normalize_mode(0o100777, false), 0o777);
    }
}
