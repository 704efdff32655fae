// SPDX-License-Identifier: MIT

//! One authenticated SFTP session's operations (spec.md §4.7.2): the
//! permission gate, the filesystem calls, and audit emission, all kept
//! independent of the `russh_sftp::server::Handler` wire glue so the
//! business logic is unit-testable on its own.

use std::net::IpAddr;
use std::sync::Arc;

use uuid::Uuid;
use wings_core::{ActivityRecord, FileEntry, Permissions, SftpOp};
use wings_engine::Server;
use wings_fs::{DirEntryInfo, FileStat, WriteKind};
use wings_store::ActivityBuffer;

use crate::error::SshError;

pub struct SftpSession {
    server: Arc<Server>,
    user: Uuid,
    ip: IpAddr,
    permissions: Permissions,
    read_only: bool,
    general_activity: Arc<ActivityBuffer>,
    sftp_activity: Arc<ActivityBuffer>,
}

impl SftpSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        server: Arc<Server>,
        user: Uuid,
        ip: IpAddr,
        permissions: Permissions,
        read_only: bool,
        general_activity: Arc<ActivityBuffer>,
        sftp_activity: Arc<ActivityBuffer>,
    ) -> Self {
        Self { server, user, ip, permissions, read_only, general_activity, sftp_activity }
    }

    fn require(&self, op: SftpOp) -> Result<(), SshError> {
        if self.server.is_suspended() {
            return Err(SshError::Suspended);
        }
        if !self.permissions.allows(op) {
            return Err(SshError::PermissionDenied);
        }
        Ok(())
    }

    fn require_mutation(&self, op: SftpOp) -> Result<(), SshError> {
        debug_assert!(op.is_mutating());
        if self.read_only {
            return Err(SshError::OperationUnsupported);
        }
        self.require(op)
    }

    fn audit(&self, event: &str, files: Vec<FileEntry>) {
        let record = ActivityRecord::new(format!("server:sftp.{event}"), self.server.id, chrono::Utc::now())
            .user(self.user)
            .ip(self.ip)
            .with_files(files);
        wings_activity::ingest(&self.general_activity, &self.sftp_activity, &record);
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>, SshError> {
        self.require(SftpOp::ReadContent)?;
        Ok(self.server.fs().read(path).await?)
    }

    pub async fn list(&self, path: &str) -> Result<Vec<DirEntryInfo>, SshError> {
        self.require(SftpOp::Read)?;
        Ok(self.server.fs().list(path).await?)
    }

    pub async fn stat(&self, path: &str) -> Result<FileStat, SshError> {
        self.require(SftpOp::Read)?;
        Ok(self.server.fs().stat(path).await?)
    }

    pub async fn write(&self, path: &str, data: &[u8]) -> Result<WriteKind, SshError> {
        let exists = self.server.fs().stat(path).await.is_ok();
        let permission = if exists { SftpOp::Update } else { SftpOp::Create };
        self.require_mutation(permission)?;

        let kind = self.server.fs().write(path, data).await?;
        let event = match kind {
            WriteKind::Created => "create",
            WriteKind::Updated => "write",
        };
        self.audit(event, vec![FileEntry::Path(path.to_string())]);
        Ok(kind)
    }

    pub async fn setstat(&self, path: &str, mode: u32) -> Result<(), SshError> {
        self.require_mutation(SftpOp::Update)?;
        self.server.fs().setstat(path, mode).await?;
        self.audit("write", vec![FileEntry::Path(path.to_string())]);
        Ok(())
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<(), SshError> {
        self.require_mutation(SftpOp::Update)?;
        self.server.fs().rename(from, to).await?;
        self.audit("rename", vec![FileEntry::Rename { from: from.to_string(), to: to.to_string() }]);
        Ok(())
    }

    pub async fn mkdir(&self, path: &str) -> Result<(), SshError> {
        self.require_mutation(SftpOp::Create)?;
        self.server.fs().mkdir(path).await?;
        self.audit("create-directory", vec![FileEntry::Path(path.to_string())]);
        Ok(())
    }

    pub async fn rmdir(&self, path: &str) -> Result<(), SshError> {
        self.require_mutation(SftpOp::Delete)?;
        self.server.fs().rmdir(path).await?;
        self.audit("delete", vec![FileEntry::Path(path.to_string())]);
        Ok(())
    }

    pub async fn remove(&self, path: &str) -> Result<(), SshError> {
        self.require_mutation(SftpOp::Delete)?;
        self.server.fs().remove(path).await?;
        self.audit("delete", vec![FileEntry::Path(path.to_string())]);
        Ok(())
    }

    pub async fn symlink(&self, target: &str, link: &str) -> Result<(), SshError> {
        self.require_mutation(SftpOp::Create)?;
        self.server.fs().symlink(target, link).await?;
        self.audit("create", vec![FileEntry::Path(link.to_string())]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tempfile::tempdir;
    use wings_core::{DoneMarker, ProcessConfiguration, ResourceLimits, ServerId, StopStrategy};
    use wings_fs::ServerFilesystem;
    use wings_store::Store;

    fn sample_config(suspended: bool) -> wings_core::ServerConfig {
        wings_core::ServerConfig {
            limits: ResourceLimits { memory_bytes: 1024, cpu_shares: 100, disk_bytes: 1_000_000, io_weight: 500 },
            image: "registry.example/game:latest".into(),
            env: Default::default(),
            startup_command: "./start.sh".into(),
            stop: StopStrategy::Native,
            process: ProcessConfiguration { done_markers: vec![DoneMarker::Literal { value: "Done".into() }], file_edits: vec![] },
            suspended,
            skip_scripts: false,
            uid: 1000,
            gid: 1000,
            stop_grace_seconds: 1,
            crash_restart: false,
        }
    }

    fn session(root: &std::path::Path, permissions: Vec<&str>, suspended: bool, read_only: bool) -> (SftpSession, Arc<ActivityBuffer>, Arc<ActivityBuffer>) {
        let fs = ServerFilesystem::new(root.to_path_buf(), nix::unistd::getuid().as_raw(), nix::unistd::getgid().as_raw(), 1_000_000);
        let server = Arc::new(Server::new(ServerId::new(), sample_config(suspended), fs));
        let store = Store::open_temporary().unwrap();
        let general = Arc::new(store.activity().unwrap());
        let sftp = Arc::new(store.sftp_activity().unwrap());
        let permissions = Permissions::new(permissions.into_iter().map(String::from));
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let session = SftpSession::new(server, Uuid::new_v4(), ip, permissions, read_only, general.clone(), sftp.clone());
        (session, general, sftp)
    }

    #[tokio::test]
    async fn write_without_create_permission_is_denied() {
        let dir = tempdir().unwrap();
        let (session, ..) = session(dir.path(), vec![], false, false);
        let err = session.write("a.txt", b"hi").await.unwrap_err();
        assert!(matches!(err, SshError::PermissionDenied));
    }

    #[tokio::test]
    async fn write_new_file_with_create_permission_audits_as_create() {
        let dir = tempdir().unwrap();
        let (session, general, sftp) = session(dir.path(), vec!["file.create"], false, false);
        session.write("a.txt", b"hi").await.unwrap();
        assert_eq!(sftp.len().unwrap(), 1);
        assert_eq!(general.len().unwrap(), 0);
    }

    #[tokio::test]
    async fn overwrite_with_only_create_permission_is_denied() {
        let dir = tempdir().unwrap();
        let (session, ..) = session(dir.path(), vec!["file.create"], false, false);
        session.write("a.txt", b"hi").await.unwrap();
        let err = session.write("a.txt", b"bye").await.unwrap_err();
        assert!(matches!(err, SshError::PermissionDenied));
    }

    #[tokio::test]
    async fn overwrite_with_update_permission_succeeds() {
        let dir = tempdir().unwrap();
        let (session, ..) = session(dir.path(), vec!["file.create", "file.update"], false, false);
        session.write("a.txt", b"hi").await.unwrap();
        session.write("a.txt", b"bye").await.unwrap();
    }

    #[tokio::test]
    async fn suspended_server_rejects_read() {
        let dir = tempdir().unwrap();
        let (session, ..) = session(dir.path(), vec!["file.read"], true, false);
        let err = session.stat("a.txt").await.unwrap_err();
        assert!(matches!(err, SshError::Suspended));
    }

    #[tokio::test]
    async fn read_only_mode_rejects_mutation_even_with_permission() {
        let dir = tempdir().unwrap();
        let (session, ..) = session(dir.path(), vec!["file.create"], false, true);
        let err = session.mkdir("dir").await.unwrap_err();
        assert!(matches!(err, SshError::OperationUnsupported));
    }

    #[tokio::test]
    async fn rename_audits_a_from_to_pair() {
        let dir = tempdir().unwrap();
        let (session, _general, sftp) = session(dir.path(), vec!["file.create", "file.update"], false, false);
        session.write("a.txt", b"hi").await.unwrap();
        session.rename("a.txt", "b.txt").await.unwrap();

        let rows = sftp.range(10).unwrap();
        let rename_row = rows.iter().find(|(_, r)| r.event == "server:sftp.rename").unwrap();
        let files = rename_row.1.files().unwrap().unwrap();
        assert_eq!(files, vec![FileEntry::Rename { from: "a.txt".to_string(), to: "b.txt".to_string() }]);
    }
}
