//! In-memory transport used by the session tests.
//!
//! [`MemoryServer`] holds a tiny filesystem plus failure switches and an
//! event log, and hands out [`SecureTransport`] instances that talk to it.

use std::collections::BTreeMap;
use std::io;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::sftp::config::Credentials;
use crate::sftp::transport::{
    RemoteFs, RemoteReader, RemoteWriter, SecureTransport, TransportHandle,
};
use crate::sftp::types::{DirEntry, FileKind, FileStat, RemotePath};

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir(u32),
}

#[derive(Default)]
struct MemoryState {
    nodes: BTreeMap<String, Node>,
    events: Vec<String>,
    refuse_connections: bool,
    reject_auth: bool,
    fail_subsystem: bool,
    fail_removals: bool,
    write_limit: Option<usize>,
}

impl MemoryState {
    fn record(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    fn parent_is_dir(&self, path: &RemotePath) -> bool {
        match path.parent() {
            Some(parent) => matches!(self.nodes.get(parent.as_str()), Some(Node::Dir(_))),
            None => false,
        }
    }

    fn stat(&self, path: &str) -> Option<FileStat> {
        self.nodes.get(path).map(|node| match node {
            Node::File(data) => FileStat {
                kind: FileKind::File,
                size: Some(data.len() as u64),
                permissions: Some(0o644),
                mtime: Some(1_700_000_000),
            },
            Node::Dir(mode) => FileStat {
                kind: FileKind::Directory,
                size: Some(4096),
                permissions: Some(*mode),
                mtime: Some(1_700_000_000),
            },
        })
    }
}

type SharedState = Arc<Mutex<MemoryState>>;

/// In-memory SFTP server.
#[derive(Clone)]
pub(crate) struct MemoryServer {
    state: SharedState,
}

impl MemoryServer {
    pub(crate) fn new() -> Self {
        let mut state = MemoryState::default();
        state.nodes.insert("/".to_string(), Node::Dir(0o755));
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub(crate) fn transport(&self) -> Box<dyn SecureTransport> {
        Box::new(MemoryTransport {
            state: self.state.clone(),
        })
    }

    pub(crate) fn add_dir(&self, path: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(RemotePath::new(path).to_string(), Node::Dir(0o755));
        self
    }

    pub(crate) fn add_file(&self, path: &str, data: &[u8]) -> &Self {
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(RemotePath::new(path).to_string(), Node::File(data.to_vec()));
        self
    }

    pub(crate) fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().unwrap().nodes.get(path) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    pub(crate) fn dir_mode(&self, path: &str) -> Option<u32> {
        match self.state.lock().unwrap().nodes.get(path) {
            Some(Node::Dir(mode)) => Some(*mode),
            _ => None,
        }
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub(crate) fn refuse_connections(&self) {
        self.state.lock().unwrap().refuse_connections = true;
    }

    pub(crate) fn reject_auth(&self) {
        self.state.lock().unwrap().reject_auth = true;
    }

    pub(crate) fn fail_subsystem(&self) {
        self.state.lock().unwrap().fail_subsystem = true;
    }

    pub(crate) fn fail_removals(&self) {
        self.state.lock().unwrap().fail_removals = true;
    }

    /// Accept at most `limit` bytes per opened write stream.
    pub(crate) fn limit_writes(&self, limit: usize) {
        self.state.lock().unwrap().write_limit = Some(limit);
    }
}

struct MemoryTransport {
    state: SharedState,
}

#[async_trait]
impl SecureTransport for MemoryTransport {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        _timeout: Duration,
    ) -> Result<Box<dyn TransportHandle>, String> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_connections {
            return Err("Connection refused".to_string());
        }
        state.record(format!("connect {}:{}", host, port));
        Ok(Box::new(MemoryHandle {
            state: self.state.clone(),
            closed: false,
        }))
    }
}

struct MemoryHandle {
    state: SharedState,
    closed: bool,
}

#[async_trait]
impl TransportHandle for MemoryHandle {
    async fn authenticate(&mut self, credentials: &Credentials<'_>) -> Result<bool, String> {
        let mut state = self.state.lock().unwrap();
        state.record(format!(
            "auth {} {}",
            credentials.method(),
            credentials.username()
        ));
        Ok(!state.reject_auth)
    }

    async fn open_subsystem(&mut self) -> Result<Box<dyn RemoteFs>, String> {
        let mut state = self.state.lock().unwrap();
        if state.fail_subsystem {
            return Err("subsystem request failed".to_string());
        }
        state.record("subsystem");
        Ok(Box::new(MemoryFs {
            state: self.state.clone(),
            closed: false,
        }))
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.lock().unwrap().record("transport close");
        }
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.record("transport drop");
        }
    }
}

struct MemoryFs {
    state: SharedState,
    closed: bool,
}

#[async_trait]
impl RemoteFs for MemoryFs {
    async fn stat(&mut self, path: &RemotePath) -> Result<Option<FileStat>, String> {
        Ok(self.state.lock().unwrap().stat(path.as_str()))
    }

    async fn create_dir(&mut self, path: &RemotePath, permissions: u32) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        if state.nodes.contains_key(path.as_str()) || !state.parent_is_dir(path) {
            return Err("Failure".to_string());
        }
        state
            .nodes
            .insert(path.to_string(), Node::Dir(permissions));
        Ok(())
    }

    async fn open_read(&mut self, path: &RemotePath) -> Result<RemoteReader, String> {
        match self.state.lock().unwrap().nodes.get(path.as_str()) {
            Some(Node::File(data)) => Ok(Box::new(Cursor::new(data.clone()))),
            Some(Node::Dir(_)) => Err("Failure".to_string()),
            None => Err("No such file".to_string()),
        }
    }

    async fn open_write(&mut self, path: &RemotePath) -> Result<RemoteWriter, String> {
        let state = self.state.lock().unwrap();
        if matches!(state.nodes.get(path.as_str()), Some(Node::Dir(_))) || !state.parent_is_dir(path)
        {
            return Err("Failure".to_string());
        }
        Ok(Box::new(MemoryWriter {
            state: self.state.clone(),
            path: path.to_string(),
            buf: Vec::new(),
            limit: state.write_limit,
        }))
    }

    async fn remove_file(&mut self, path: &RemotePath) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        if state.fail_removals {
            return Err("Permission denied".to_string());
        }
        match state.nodes.get(path.as_str()) {
            Some(Node::File(_)) => {
                state.nodes.remove(path.as_str());
                Ok(())
            }
            Some(Node::Dir(_)) => Err("Failure".to_string()),
            None => Err("No such file".to_string()),
        }
    }

    async fn read_dir(&mut self, path: &RemotePath) -> Result<Vec<DirEntry>, String> {
        let state = self.state.lock().unwrap();
        let Some(dir_stat) = state.stat(path.as_str()).filter(|s| s.is_dir()) else {
            return Err("No such file".to_string());
        };

        let mut entries = vec![
            DirEntry {
                name: ".".to_string(),
                stat: dir_stat.clone(),
            },
            DirEntry {
                name: "..".to_string(),
                stat: dir_stat,
            },
        ];
        for key in state.nodes.keys() {
            let candidate = RemotePath::new(key);
            if key != path.as_str() && candidate.parent().as_ref() == Some(path) {
                let name = key.rsplit('/').next().unwrap_or(key).to_string();
                if let Some(stat) = state.stat(key) {
                    entries.push(DirEntry { name, stat });
                }
            }
        }
        Ok(entries)
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.lock().unwrap().record("subsystem close");
        }
    }
}

impl Drop for MemoryFs {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.record("subsystem drop");
        }
    }
}

/// Buffers written bytes and commits them on shutdown.
struct MemoryWriter {
    state: SharedState,
    path: String,
    buf: Vec<u8>,
    limit: Option<usize>,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let room = match self.limit {
            Some(limit) => limit.saturating_sub(self.buf.len()),
            None => buf.len(),
        };
        let n = room.min(buf.len());
        self.buf.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let data = std::mem::take(&mut self.buf);
        let path = self.path.clone();
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(path, Node::File(data));
        Poll::Ready(Ok(()))
    }
}
