//! Transport capability traits.
//!
//! The session never speaks the SSH or SFTP wire protocols itself. It drives
//! three traits instead:
//!
//! - [`SecureTransport`]: opens a transport to `host:port`
//! - [`TransportHandle`]: authenticates that transport and opens the SFTP
//!   subsystem on it
//! - [`RemoteFs`]: the open subsystem, addressed by [`RemotePath`]
//!
//! The russh-backed implementation lives in `native`; tests substitute an
//! in-memory one. Failures are reported as plain messages and mapped to
//! [`SftpError`](crate::sftp::SftpError) variants by the session.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::sftp::config::Credentials;
use crate::sftp::types::{DirEntry, FileStat, RemotePath};

/// Readable remote file stream.
pub type RemoteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Writable remote file stream. Data is committed on `shutdown`.
pub type RemoteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Factory for authenticated SSH transports.
#[async_trait]
pub trait SecureTransport: Send + Sync {
    /// Establish a transport to `host:port`.
    ///
    /// `timeout` bounds the TCP connect and SSH handshake.
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: std::time::Duration,
    ) -> Result<Box<dyn TransportHandle>, String>;
}

/// One established transport.
#[async_trait]
pub trait TransportHandle: Send {
    /// Authenticate with the given credentials.
    ///
    /// * `Ok(true)` - Authentication succeeded
    /// * `Ok(false)` - Credentials rejected by the server
    /// * `Err(message)` - Error during the attempt (e.g. unreadable key)
    async fn authenticate(&mut self, credentials: &Credentials<'_>) -> Result<bool, String>;

    /// Start the SFTP subsystem on this authenticated transport.
    async fn open_subsystem(&mut self) -> Result<Box<dyn RemoteFs>, String>;

    /// Close the transport. Must tolerate being called more than once.
    async fn close(&mut self);
}

/// An open SFTP subsystem.
#[async_trait]
pub trait RemoteFs: Send {
    /// Stat a path, following symbolic links.
    ///
    /// Returns `Ok(None)` when the path does not exist.
    async fn stat(&mut self, path: &RemotePath) -> Result<Option<FileStat>, String>;

    /// Create a single directory with the given mode bits.
    async fn create_dir(&mut self, path: &RemotePath, permissions: u32) -> Result<(), String>;

    async fn open_read(&mut self, path: &RemotePath) -> Result<RemoteReader, String>;

    /// Open for writing, creating or truncating the file.
    async fn open_write(&mut self, path: &RemotePath) -> Result<RemoteWriter, String>;

    async fn remove_file(&mut self, path: &RemotePath) -> Result<(), String>;

    /// Enumerate a directory. Entry stats do not follow symbolic links.
    async fn read_dir(&mut self, path: &RemotePath) -> Result<Vec<DirEntry>, String>;

    /// Close the subsystem. Must tolerate being called more than once.
    async fn close(&mut self);
}
