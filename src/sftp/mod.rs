//! SFTP client session module.
//!
//! This module is organized into the following submodules:
//!
//! - `config`: Connection configuration and environment variable resolution
//! - `error`: Error taxonomy for session operations
//! - `types`: Listing entries, stat results and remote paths
//! - `transport`: Traits the session drives instead of speaking SSH itself
//! - `auth`: Password and key-pair authentication strategies
//! - `native`: russh-backed transport implementation
//! - `session`: The session lifecycle and filesystem operations

pub mod auth;
pub mod config;
pub mod error;
#[cfg(test)]
pub(crate) mod mock;
pub mod native;
pub mod session;
pub mod transport;
pub mod types;

pub use config::{ConnectionConfig, DEFAULT_DIR_PERMISSIONS, DEFAULT_PORT, parse_address};
pub use error::{Result, SftpError};
pub use session::SftpSession;
pub use types::{EntryKind, RemoteEntry, SessionState};
