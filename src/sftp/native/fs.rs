//! SFTP subsystem over `russh-sftp`.

use async_trait::async_trait;
use russh_sftp::client::SftpSession as RusshSftpSession;
use russh_sftp::client::error::Error as RusshSftpError;
use russh_sftp::protocol::{FileAttributes, StatusCode};
use tracing::debug;

use crate::sftp::transport::{RemoteFs, RemoteReader, RemoteWriter};
use crate::sftp::types::{DirEntry, FileKind, FileStat, RemotePath};

/// [`RemoteFs`] backed by a `russh-sftp` session.
pub struct RusshRemoteFs {
    sftp: Option<RusshSftpSession>,
}

impl RusshRemoteFs {
    pub fn new(sftp: RusshSftpSession) -> Self {
        Self { sftp: Some(sftp) }
    }

    fn sftp(&self) -> Result<&RusshSftpSession, String> {
        self.sftp
            .as_ref()
            .ok_or_else(|| "SFTP subsystem already closed".to_string())
    }
}

/// Check whether an SFTP error indicates "not found".
fn is_not_found(e: &RusshSftpError) -> bool {
    matches!(
        e,
        RusshSftpError::Status(s) if s.status_code == StatusCode::NoSuchFile
    )
}

fn to_stat(attrs: &FileAttributes) -> FileStat {
    let file_type = attrs.file_type();
    let kind = if file_type.is_dir() {
        FileKind::Directory
    } else if file_type.is_file() {
        FileKind::File
    } else if file_type.is_symlink() {
        FileKind::Symlink
    } else {
        FileKind::Other
    };

    FileStat {
        kind,
        size: attrs.size,
        permissions: attrs.permissions,
        mtime: attrs.mtime,
    }
}

#[async_trait]
impl RemoteFs for RusshRemoteFs {
    async fn stat(&mut self, path: &RemotePath) -> Result<Option<FileStat>, String> {
        match self.sftp()?.metadata(path.as_str()).await {
            Ok(attrs) => Ok(Some(to_stat(&attrs))),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn create_dir(&mut self, path: &RemotePath, permissions: u32) -> Result<(), String> {
        let sftp = self.sftp()?;
        sftp.create_dir(path.as_str())
            .await
            .map_err(|e| e.to_string())?;

        // MKDIR carries no attributes here, so the mode always follows as
        // a SETSTAT carrying nothing but the permissions
        let attrs = FileAttributes {
            size: None,
            uid: None,
            gid: None,
            atime: None,
            mtime: None,
            permissions: Some(permissions),
            ..Default::default()
        };
        sftp.set_metadata(path.as_str(), attrs)
            .await
            .map_err(|e| format!("Failed to set permissions {:o}: {}", permissions, e))
    }

    async fn open_read(&mut self, path: &RemotePath) -> Result<RemoteReader, String> {
        let file = self
            .sftp()?
            .open(path.as_str())
            .await
            .map_err(|e| e.to_string())?;
        Ok(Box::new(file))
    }

    async fn open_write(&mut self, path: &RemotePath) -> Result<RemoteWriter, String> {
        let file = self
            .sftp()?
            .create(path.as_str())
            .await
            .map_err(|e| e.to_string())?;
        Ok(Box::new(file))
    }

    async fn remove_file(&mut self, path: &RemotePath) -> Result<(), String> {
        self.sftp()?
            .remove_file(path.as_str())
            .await
            .map_err(|e| e.to_string())
    }

    async fn read_dir(&mut self, path: &RemotePath) -> Result<Vec<DirEntry>, String> {
        let entries = self
            .sftp()?
            .read_dir(path.as_str())
            .await
            .map_err(|e| e.to_string())?;

        Ok(entries
            .map(|entry| DirEntry {
                name: entry.file_name(),
                stat: to_stat(&entry.metadata()),
            })
            .collect())
    }

    async fn close(&mut self) {
        if self.sftp.take().is_some() {
            debug!("SFTP subsystem released");
        }
    }
}
