//! Value types shared by the session and the transport backends.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an [`SftpSession`](crate::sftp::SftpSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created from configuration, never connected.
    Unconnected,
    /// Transport authenticated and SFTP subsystem open.
    Connected,
    /// Handles released by `disconnect` or teardown.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unconnected => write!(f, "unconnected"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Kind of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry produced by a directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Directory the entry was listed from
    pub parent: String,
    pub name: String,
    /// `parent` joined with `name`
    pub path: String,
    /// Size in bytes, when reported by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Last modification time, when reported by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// File type as reported by the SFTP subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// Attributes returned by a stat call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub kind: FileKind,
    pub size: Option<u64>,
    pub permissions: Option<u32>,
    /// Seconds since the Unix epoch
    pub mtime: Option<u32>,
}

impl FileStat {
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.mtime
            .and_then(|secs| DateTime::<Utc>::from_timestamp(i64::from(secs), 0))
    }
}

/// One raw directory entry as returned by the subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub stat: FileStat,
}

/// A normalized remote path.
///
/// Never empty, duplicate separators are collapsed and a trailing `/` is
/// stripped except for the root itself. Relative paths stay relative; the
/// server resolves them against the login directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn new(path: &str) -> Self {
        if path.is_empty() {
            return Self("/".to_string());
        }

        let absolute = path.starts_with('/');
        let joined = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");

        match (absolute, joined.is_empty()) {
            (true, _) => Self(format!("/{}", joined)),
            (false, true) => Self(".".to_string()),
            (false, false) => Self(joined),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a single entry name.
    pub fn join(&self, name: &str) -> Self {
        Self::new(&join_remote(&self.0, name))
    }

    /// Parent directory, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0 == "/" || self.0 == "." {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some(("", _)) => Some(Self("/".to_string())),
            Some((parent, _)) => Some(Self(parent.to_string())),
            None => Some(Self(".".to_string())),
        }
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Join a parent path and an entry name with a single `/`.
pub fn join_remote(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}
