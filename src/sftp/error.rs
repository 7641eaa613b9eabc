//! Error taxonomy for SFTP sessions.
//!
//! Every failing operation aborts immediately and surfaces one of these
//! variants to the caller. There is no retry and no partial-success
//! reporting. Backend failures arrive as plain messages from the transport
//! traits and are wrapped here together with the host, user or path they
//! concern.
//!
//! # Examples
//!
//! ```rust,ignore
//! match session.filesize("/etc").await {
//!     Err(SftpError::NotAFile { path }) => println!("{} is not a file", path),
//!     Err(e) => return Err(e),
//!     Ok(size) => println!("{} bytes", size),
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the session API.
pub type Result<T> = std::result::Result<T, SftpError>;

#[derive(Debug, Error)]
pub enum SftpError {
    /// `connect` was called on a session that is already connected.
    #[error("Session is already connected to {host}:{port}")]
    AlreadyConnected { host: String, port: u16 },

    /// The transport to `host:port` could not be established.
    #[error("Failed to connect to {host}:{port}: {reason}")]
    ConnectFailed {
        host: String,
        port: u16,
        reason: String,
    },

    /// The server rejected the configured credentials.
    #[error("Authentication failed for user '{username}': {reason}")]
    AuthFailed { username: String, reason: String },

    /// Neither a password login nor a key login was configured.
    #[error("No credentials configured for {host}:{port}")]
    MissingCredentials { host: String, port: u16 },

    /// The SFTP subsystem could not be started on the authenticated transport.
    #[error("Failed to initialize SFTP subsystem: {reason}")]
    SubsystemInitFailed { reason: String },

    /// A filesystem operation was attempted outside the `Connected` state.
    #[error("Session is not connected")]
    NotConnected,

    #[error("Directory already exists: {path}")]
    DirectoryAlreadyExists { path: String },

    #[error("Failed to create directory {path}: {reason}")]
    DirectoryCreateFailed { path: String, reason: String },

    /// The local source file of an upload is missing or unreadable.
    #[error("Failed to read local file {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open remote stream for {path}: {reason}")]
    RemoteStreamOpenFailed { path: String, reason: String },

    /// Fewer bytes than requested reached the remote file.
    #[error("Incomplete write to {path}: wrote {written} of {expected} bytes")]
    RemoteWriteIncomplete {
        path: String,
        written: usize,
        expected: usize,
    },

    #[error("Failed to read remote file {path}: {reason}")]
    RemoteReadFailed { path: String, reason: String },

    #[error("Failed to write local file {}: {reason}", path.display())]
    LocalWriteFailed { path: PathBuf, reason: String },

    #[error("Not a file: {path}")]
    NotAFile { path: String },

    #[error("Failed to stat {path}: {reason}")]
    StatFailed { path: String, reason: String },

    #[error("Failed to open directory {path}: {reason}")]
    DirectoryOpenFailed { path: String, reason: String },

    #[error("Failed to remove {path}: {reason}")]
    RemoveFailed { path: String, reason: String },

    /// A `host:port` address string could not be parsed.
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
}
