//! The SFTP session: connection lifecycle plus remote filesystem operations.
//!
//! A session is built from an immutable [`ConnectionConfig`], connected
//! explicitly, and then used for sequential operations. Every operation
//! takes `&mut self`, so one session is never driven from two tasks at once.
//! Open one session per concurrent unit of work instead.
//!
//! ```text
//!   Unconnected --connect--> Connected --disconnect--> Closed
//!                                ^                        |
//!                                +-------connect----------+
//! ```
//!
//! Filesystem operations outside `Connected` fail with
//! [`SftpError::NotConnected`] before touching the network.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::sftp::config::ConnectionConfig;
use crate::sftp::error::{Result, SftpError};
use crate::sftp::native::RusshTransport;
use crate::sftp::transport::{RemoteFs, SecureTransport, TransportHandle};
use crate::sftp::types::{
    EntryKind, FileKind, FileStat, RemoteEntry, RemotePath, SessionState, join_remote,
};

/// A stateful SFTP client session.
pub struct SftpSession {
    config: ConnectionConfig,
    transport: Box<dyn SecureTransport>,
    handle: Option<Box<dyn TransportHandle>>,
    fs: Option<Box<dyn RemoteFs>>,
    state: SessionState,
}

impl SftpSession {
    /// Create an unconnected session that will use russh.
    pub fn new(config: ConnectionConfig) -> Self {
        let transport = RusshTransport::new(config.compression_enabled());
        Self::with_transport(config, Box::new(transport))
    }

    /// Create an unconnected session on a caller-provided transport.
    pub fn with_transport(config: ConnectionConfig, transport: Box<dyn SecureTransport>) -> Self {
        Self {
            config,
            transport,
            handle: None,
            fs: None,
            state: SessionState::Unconnected,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Open the transport, authenticate and start the SFTP subsystem.
    ///
    /// A key login is used when one is fully configured, otherwise the
    /// password login. On failure every partially opened handle is released
    /// and the session stays in its previous state.
    pub async fn connect(&mut self) -> Result<&mut Self> {
        let host = self.config.host().to_string();
        let port = self.config.get_port();

        if self.state == SessionState::Connected {
            return Err(SftpError::AlreadyConnected { host, port });
        }

        let credentials = self
            .config
            .credentials()
            .ok_or_else(|| SftpError::MissingCredentials {
                host: host.clone(),
                port,
            })?;
        let username = credentials.username().to_string();

        info!(
            "Connecting to {}@{}:{} using {} authentication",
            username,
            host,
            port,
            credentials.method()
        );

        let mut handle = self
            .transport
            .connect(&host, port, self.config.get_connect_timeout())
            .await
            .map_err(|reason| {
                error!("Connection to {}:{} failed: {}", host, port, reason);
                SftpError::ConnectFailed {
                    host: host.clone(),
                    port,
                    reason,
                }
            })?;

        let auth_error = match handle.authenticate(&credentials).await {
            Ok(true) => None,
            Ok(false) => Some(format!("{} authentication rejected", credentials.method())),
            Err(reason) => Some(reason),
        };
        if let Some(reason) = auth_error {
            warn!("Authentication failed for {}@{}:{}: {}", username, host, port, reason);
            handle.close().await;
            return Err(SftpError::AuthFailed { username, reason });
        }

        let fs = match handle.open_subsystem().await {
            Ok(fs) => fs,
            Err(reason) => {
                error!("SFTP subsystem on {}:{} failed: {}", host, port, reason);
                handle.close().await;
                return Err(SftpError::SubsystemInitFailed { reason });
            }
        };

        self.handle = Some(handle);
        self.fs = Some(fs);
        self.state = SessionState::Connected;
        info!("Connected to {}@{}:{}", username, host, port);
        Ok(self)
    }

    /// Release the subsystem, then the transport.
    ///
    /// Safe to call in any state. A session that was never connected is left
    /// untouched.
    pub async fn disconnect(&mut self) {
        if let Some(mut fs) = self.fs.take() {
            fs.close().await;
        }
        if let Some(mut handle) = self.handle.take() {
            handle.close().await;
            info!(
                "Disconnected from {}:{}",
                self.config.host(),
                self.config.get_port()
            );
        }
        if self.state == SessionState::Connected {
            self.state = SessionState::Closed;
        }
    }

    fn fs(&mut self) -> Result<&mut Box<dyn RemoteFs>> {
        match (self.state, self.fs.as_mut()) {
            (SessionState::Connected, Some(fs)) => Ok(fs),
            (state, _) => {
                debug!("Rejecting operation: session is {}", state);
                Err(SftpError::NotConnected)
            }
        }
    }

    /// Create a remote directory.
    ///
    /// * `permissions` - Mode bits for every directory created
    /// * `recursive` - Also create missing ancestors
    pub async fn mkdir(
        &mut self,
        path: &str,
        permissions: u32,
        recursive: bool,
    ) -> Result<&mut Self> {
        let fs = self.fs()?.as_mut();
        let path = RemotePath::new(path);
        debug!(
            "mkdir {} (mode {:o}, recursive: {})",
            path, permissions, recursive
        );

        if stat_if_exists(fs, &path).await.is_some_and(|s| s.is_dir()) {
            return Err(SftpError::DirectoryAlreadyExists {
                path: path.to_string(),
            });
        }

        if recursive {
            create_ancestors(fs, &path, permissions).await?;
        }
        create_dir(fs, &path, permissions).await?;
        Ok(self)
    }

    /// Copy a local file to `remote`, replacing it if present.
    pub async fn upload(&mut self, local: impl AsRef<Path>, remote: &str) -> Result<&mut Self> {
        let local = local.as_ref();
        let fs = self.fs()?.as_mut();

        let data = tokio::fs::read(local)
            .await
            .map_err(|source| SftpError::SourceUnreadable {
                path: local.to_path_buf(),
                source,
            })?;

        let remote = RemotePath::new(remote);
        debug!("Uploading {} ({} bytes) to {}", local.display(), data.len(), remote);
        write_remote(fs, &remote, &data).await?;
        Ok(self)
    }

    /// Replace the remote file at `remote` with `data`.
    pub async fn write(&mut self, remote: &str, data: impl AsRef<[u8]>) -> Result<&mut Self> {
        let fs = self.fs()?.as_mut();
        let remote = RemotePath::new(remote);
        write_remote(fs, &remote, data.as_ref()).await?;
        Ok(self)
    }

    /// Read the whole remote file.
    pub async fn read(&mut self, remote: &str) -> Result<Vec<u8>> {
        let fs = self.fs()?.as_mut();
        read_remote(fs, &RemotePath::new(remote)).await
    }

    /// Copy a remote file to the local filesystem.
    ///
    /// Without `local`, a fresh path in the system temp directory is chosen
    /// using the configured prefix. Returns the local path written.
    pub async fn download(&mut self, remote: &str, local: Option<&Path>) -> Result<PathBuf> {
        let target = match local {
            Some(path) => path.to_path_buf(),
            None => temp_download_path(self.config.get_tmp_prefix()),
        };

        let data = self.read(remote).await?;
        debug!("Saving {} ({} bytes) to {}", remote, data.len(), target.display());
        write_local_locked(&target, data).await?;
        Ok(target)
    }

    /// Size in bytes of a regular remote file.
    pub async fn filesize(&mut self, remote: &str) -> Result<u64> {
        let fs = self.fs()?.as_mut();
        let path = RemotePath::new(remote);

        match fs.stat(&path).await {
            Ok(Some(stat)) if stat.is_file() => stat.size.ok_or_else(|| SftpError::StatFailed {
                path: path.to_string(),
                reason: "Server did not report a size".to_string(),
            }),
            Ok(_) => Err(SftpError::NotAFile {
                path: path.to_string(),
            }),
            Err(reason) => Err(SftpError::StatFailed {
                path: path.to_string(),
                reason,
            }),
        }
    }

    /// Remove a remote file.
    pub async fn delete(&mut self, remote: &str) -> Result<&mut Self> {
        let fs = self.fs()?.as_mut();
        let path = RemotePath::new(remote);

        fs.remove_file(&path)
            .await
            .map_err(|reason| SftpError::RemoveFailed {
                path: path.to_string(),
                reason,
            })?;
        debug!("Removed {}", path);
        Ok(self)
    }

    /// List a remote directory.
    ///
    /// `.` and `..` are omitted. With `recursive`, the entries of each
    /// subdirectory follow that directory's own entry. A path that is not a
    /// directory yields an empty listing.
    pub async fn list(&mut self, dir: &str, recursive: bool) -> Result<Vec<RemoteEntry>> {
        let fs = self.fs()?.as_mut();
        let dir = RemotePath::new(dir);

        let mut entries = Vec::new();
        list_into(fs, &dir, recursive, &mut entries).await?;
        Ok(entries)
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        let fs = self.fs.take();
        let handle = self.handle.take();
        if fs.is_some() || handle.is_some() {
            debug!(
                "Releasing session to {}:{} on drop",
                self.config.host(),
                self.config.get_port()
            );
        }
        // Subsystem before transport
        drop(fs);
        drop(handle);
    }
}

/// Stat that treats any failure as "does not exist".
async fn stat_if_exists(fs: &mut dyn RemoteFs, path: &RemotePath) -> Option<FileStat> {
    match fs.stat(path).await {
        Ok(stat) => stat,
        Err(reason) => {
            debug!("stat {} failed: {}", path, reason);
            None
        }
    }
}

async fn create_dir(fs: &mut dyn RemoteFs, path: &RemotePath, permissions: u32) -> Result<()> {
    fs.create_dir(path, permissions)
        .await
        .map_err(|reason| SftpError::DirectoryCreateFailed {
            path: path.to_string(),
            reason,
        })
}

/// Create every missing ancestor of `path`, outermost first.
async fn create_ancestors(
    fs: &mut dyn RemoteFs,
    path: &RemotePath,
    permissions: u32,
) -> Result<()> {
    let mut ancestors = Vec::new();
    let mut current = path.parent();
    while let Some(parent) = current {
        current = parent.parent();
        ancestors.push(parent);
    }

    for ancestor in ancestors.into_iter().rev() {
        if matches!(ancestor.as_str(), "/" | ".") {
            continue;
        }
        if stat_if_exists(fs, &ancestor).await.is_some_and(|s| s.is_dir()) {
            continue;
        }
        debug!("Creating missing ancestor {}", ancestor);
        create_dir(fs, &ancestor, permissions).await?;
    }
    Ok(())
}

async fn write_remote(fs: &mut dyn RemoteFs, path: &RemotePath, data: &[u8]) -> Result<()> {
    let mut writer = fs
        .open_write(path)
        .await
        .map_err(|reason| SftpError::RemoteStreamOpenFailed {
            path: path.to_string(),
            reason,
        })?;

    let mut written = 0;
    while written < data.len() {
        match writer.write(&data[written..]).await {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) => {
                warn!("Write to {} failed after {} bytes: {}", path, written, e);
                break;
            }
        }
    }

    if written < data.len() {
        if let Err(e) = writer.shutdown().await {
            debug!("Closing {} after short write failed: {}", path, e);
        }
        return Err(SftpError::RemoteWriteIncomplete {
            path: path.to_string(),
            written,
            expected: data.len(),
        });
    }

    // Nothing is confirmed on the remote side until the close succeeds
    writer.shutdown().await.map_err(|e| {
        warn!("Closing {} failed: {}", path, e);
        SftpError::RemoteWriteIncomplete {
            path: path.to_string(),
            written: 0,
            expected: data.len(),
        }
    })?;

    debug!("Wrote {} bytes to {}", written, path);
    Ok(())
}

async fn read_remote(fs: &mut dyn RemoteFs, path: &RemotePath) -> Result<Vec<u8>> {
    let mut reader = fs
        .open_read(path)
        .await
        .map_err(|reason| SftpError::RemoteStreamOpenFailed {
            path: path.to_string(),
            reason,
        })?;

    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .await
        .map_err(|e| SftpError::RemoteReadFailed {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

    debug!("Read {} bytes from {}", data.len(), path);
    Ok(data)
}

fn temp_download_path(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}{}", prefix, Uuid::new_v4().simple()))
}

/// Write `data` to a local file while holding an exclusive lock on it.
async fn write_local_locked(path: &Path, data: Vec<u8>) -> Result<()> {
    let target = path.to_path_buf();
    let to_error = |reason: String| SftpError::LocalWriteFailed {
        path: path.to_path_buf(),
        reason,
    };

    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&target)?;
        file.lock()?;
        // Truncate only once the lock is held
        file.set_len(0)?;
        file.write_all(&data)?;
        file.flush()
    })
    .await
    .map_err(|e| to_error(e.to_string()))?
    .map_err(|e| to_error(e.to_string()))
}

/// Append the entries of `dir` to `out`, descending into subdirectories when
/// `recursive` is set.
async fn list_into(
    fs: &mut dyn RemoteFs,
    dir: &RemotePath,
    recursive: bool,
    out: &mut Vec<RemoteEntry>,
) -> Result<()> {
    if !stat_if_exists(fs, dir).await.is_some_and(|s| s.is_dir()) {
        debug!("{} is not a directory, nothing to list", dir);
        return Ok(());
    }

    let raw = fs
        .read_dir(dir)
        .await
        .map_err(|reason| SftpError::DirectoryOpenFailed {
            path: dir.to_string(),
            reason,
        })?;

    for entry in raw {
        if entry.name == "." || entry.name == ".." {
            continue;
        }

        let child = dir.join(&entry.name);
        let stat = if entry.stat.kind == FileKind::Symlink {
            // Classify links by what they point at
            stat_if_exists(fs, &child).await.unwrap_or(entry.stat)
        } else {
            entry.stat
        };
        let kind = if stat.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        out.push(RemoteEntry {
            kind,
            parent: dir.to_string(),
            path: join_remote(dir.as_str(), &entry.name),
            name: entry.name,
            size: stat.size,
            modified: stat.modified(),
        });

        if recursive && kind == EntryKind::Directory {
            Box::pin(list_into(fs, &child, true, out)).await?;
        }
    }
    Ok(())
}
