// SPDX-License-Identifier: MIT

//! `russh_sftp::server::Handler` glue (spec.md §4.7.2): a thin wire-protocol
//! shim over [`SftpSession`]. `wings-fs` only exposes whole-file
//! read/write, so handles buffer: a read handle loads the file once at
//! `open` and serves slices, a write handle accumulates bytes and flushes
//! with one `SftpSession::write` on `close`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use russh_sftp::protocol::{Attrs, Data, FileAttributes, Handle, Name, OpenFlags, ReplyOk, Status, StatusCode, Version};
use tokio::sync::Mutex;

use crate::error::SshError;
use crate::ops::SftpSession;

enum HandleState {
    Read { data: Vec<u8> },
    Write { path: String, buffer: Vec<u8> },
    Dir { entries: Vec<wings_fs::DirEntryInfo> },
}

/// Opaque error carrying only the SFTP status code the business error maps
/// to — `russh_sftp` only needs that much at the wire boundary.
#[derive(Debug)]
pub struct SftpHandlerError(pub StatusCode);

impl From<SshError> for SftpHandlerError {
    fn from(err: SshError) -> Self {
        SftpHandlerError(status_code_for(err.to_wings_error().sftp_status_code()))
    }
}

fn status_code_for(code: u32) -> StatusCode {
    match code {
        2 => StatusCode::NoSuchFile,
        3 => StatusCode::PermissionDenied,
        // StatusCode has no extension slot for "quota exceeded" (code 15 in
        // spec.md's table is a vendor extension); the closest standard
        // status is a generic failure.
        _ => StatusCode::Failure,
    }
}

pub struct SftpHandler {
    session: SftpSession,
    handles: Mutex<HashMap<String, HandleState>>,
    next_handle: AtomicU64,
}

impl SftpHandler {
    pub fn new(session: SftpSession) -> Self {
        Self { session, handles: Mutex::new(HashMap::new()), next_handle: AtomicU64::new(0) }
    }

    fn fresh_handle(&self) -> String {
        self.next_handle.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn stat_to_attrs(stat: &wings_fs::FileStat) -> FileAttributes {
        let mut attrs = FileAttributes::default();
        attrs.size = Some(stat.len);
        attrs.permissions = Some(stat.mode);
        attrs.mtime = Some(stat.modified.duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs() as u32).unwrap_or(0));
        attrs
    }
}

#[async_trait]
impl russh_sftp::server::Handler for SftpHandler {
    type Error = SftpHandlerError;

    fn unimplemented(&self) -> Self::Error {
        SftpHandlerError(StatusCode::OpUnsupported)
    }

    async fn init(&mut self, _version: u32, _extensions: HashMap<String, String>) -> Result<Version, Self::Error> {
        Ok(Version { version: 3, extensions: HashMap::new() })
    }

    async fn open(&mut self, id: u32, filename: String, pflags: OpenFlags, _attrs: FileAttributes) -> Result<Handle, Self::Error> {
        let handle = self.fresh_handle();
        let state = if pflags.contains(OpenFlags::WRITE) {
            HandleState::Write { path: filename, buffer: Vec::new() }
        } else {
            let data = self.session.read(&filename).await?;
            HandleState::Read { data }
        };
        self.handles.lock().await.insert(handle.clone(), state);
        Ok(Handle { id, handle })
    }

    async fn close(&mut self, id: u32, handle: String) -> Result<Status, Self::Error> {
        if let Some(HandleState::Write { path, buffer }) = self.handles.lock().await.remove(&handle) {
            self.session.write(&path, &buffer).await?;
        }
        Ok(ok_status(id))
    }

    async fn read(&mut self, id: u32, handle: String, offset: u64, len: u32) -> Result<Data, Self::Error> {
        let handles = self.handles.lock().await;
        match handles.get(&handle) {
            Some(HandleState::Read { data }) => {
                let start = (offset as usize).min(data.len());
                let end = (start + len as usize).min(data.len());
                if start >= data.len() {
                    return Err(SftpHandlerError(StatusCode::Eof));
                }
                Ok(Data { id, data: data[start..end].to_vec() })
            }
            _ => Err(SftpHandlerError(StatusCode::Failure)),
        }
    }

    async fn write(&mut self, id: u32, handle: String, offset: u64, data: Vec<u8>) -> Result<Status, Self::Error> {
        let mut handles = self.handles.lock().await;
        match handles.get_mut(&handle) {
            Some(HandleState::Write { buffer, .. }) => {
                let offset = offset as usize;
                if buffer.len() < offset {
                    buffer.resize(offset, 0);
                }
                let end = offset + data.len();
                if buffer.len() < end {
                    buffer.resize(end, 0);
                }
                buffer[offset..end].copy_from_slice(&data);
                Ok(ok_status(id))
            }
            _ => Err(SftpHandlerError(StatusCode::Failure)),
        }
    }

    async fn lstat(&mut self, id: u32, path: String) -> Result<Attrs, Self::Error> {
        let stat = self.session.stat(&path).await?;
        Ok(Attrs { id, attrs: Self::stat_to_attrs(&stat) })
    }

    async fn stat(&mut self, id: u32, path: String) -> Result<Attrs, Self::Error> {
        let stat = self.session.stat(&path).await?;
        Ok(Attrs { id, attrs: Self::stat_to_attrs(&stat) })
    }

    async fn fstat(&mut self, id: u32, handle: String) -> Result<Attrs, Self::Error> {
        let handles = self.handles.lock().await;
        let size = match handles.get(&handle) {
            Some(HandleState::Read { data }) => data.len() as u64,
            Some(HandleState::Write { buffer, .. }) => buffer.len() as u64,
            _ => return Err(SftpHandlerError(StatusCode::Failure)),
        };
        let mut attrs = FileAttributes::default();
        attrs.size = Some(size);
        Ok(Attrs { id, attrs })
    }

    async fn setstat(&mut self, id: u32, path: String, attrs: FileAttributes) -> Result<Status, Self::Error> {
        self.session.setstat(&path, attrs.permissions.unwrap_or(0)).await?;
        Ok(ok_status(id))
    }

    async fn fsetstat(&mut self, id: u32, _handle: String, _attrs: FileAttributes) -> Result<Status, Self::Error> {
        Ok(ok_status(id))
    }

    async fn opendir(&mut self, id: u32, path: String) -> Result<Handle, Self::Error> {
        let entries = self.session.list(&path).await?;
        let handle = self.fresh_handle();
        self.handles.lock().await.insert(handle.clone(), HandleState::Dir { entries });
        Ok(Handle { id, handle })
    }

    async fn readdir(&mut self, id: u32, handle: String) -> Result<Name, Self::Error> {
        let mut handles = self.handles.lock().await;
        match handles.get_mut(&handle) {
            Some(HandleState::Dir { entries }) if !entries.is_empty() => {
                let files = entries
                    .drain(..)
                    .map(|entry| russh_sftp::protocol::File {
                        filename: entry.name.clone(),
                        longname: entry.name,
                        attrs: Self::stat_to_attrs(&entry.stat),
                    })
                    .collect();
                Ok(Name { id, files })
            }
            Some(HandleState::Dir { .. }) => Err(SftpHandlerError(StatusCode::Eof)),
            _ => Err(SftpHandlerError(StatusCode::Failure)),
        }
    }

    async fn remove(&mut self, id: u32, filename: String) -> Result<Status, Self::Error> {
        self.session.remove(&filename).await?;
        Ok(ok_status(id))
    }

    async fn mkdir(&mut self, id: u32, path: String, _attrs: FileAttributes) -> Result<Status, Self::Error> {
        self.session.mkdir(&path).await?;
        Ok(ok_status(id))
    }

    async fn rmdir(&mut self, id: u32, path: String) -> Result<Status, Self::Error> {
        self.session.rmdir(&path).await?;
        Ok(ok_status(id))
    }

    async fn realpath(&mut self, id: u32, path: String) -> Result<Name, Self::Error> {
        Ok(Name {
            id,
            files: vec![russh_sftp::protocol::File {
                filename: path.clone(),
                longname: path,
                attrs: FileAttributes::default(),
            }],
        })
    }

    async fn rename(&mut self, id: u32, oldpath: String, newpath: String) -> Result<Status, Self::Error> {
        self.session.rename(&oldpath, &newpath).await?;
        Ok(ok_status(id))
    }

    async fn readlink(&mut self, _id: u32, _path: String) -> Result<Name, Self::Error> {
        Err(SftpHandlerError(StatusCode::OpUnsupported))
    }

    async fn symlink(&mut self, id: u32, linkpath: String, targetpath: String) -> Result<Status, Self::Error> {
        self.session.symlink(&targetpath, &linkpath).await?;
        Ok(ok_status(id))
    }

    async fn extended(&mut self, _id: u32, _request: String, _data: Vec<u8>) -> Result<ReplyOk, Self::Error> {
        Err(SftpHandlerError(StatusCode::OpUnsupported))
    }
}

fn ok_status(id: u32) -> Status {
    Status { id, status_code: StatusCode::Ok, error_message: String::new(), language_tag: String::new() }
}
