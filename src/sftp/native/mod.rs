//! russh-backed implementation of the transport traits.
//!
//! ## Connection Lifecycle
//!
//! 1. **Client Configuration**: keepalive every 30 seconds, no inactivity
//!    timeout, optional zlib compression.
//! 2. **Connection Establishment**: TCP connect and SSH handshake, bounded by
//!    the configured connect timeout.
//! 3. **Authentication**: password or key pair, via [`strategy_for`].
//! 4. **Subsystem**: a session channel requests the `sftp` subsystem and is
//!    handed to `russh-sftp`.

mod fs;
mod handler;

pub use fs::RusshRemoteFs;
pub use handler::SshClientHandler;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::{Disconnect, client};
use russh_sftp::client::SftpSession as RusshSftpSession;
use tracing::{debug, info, warn};

use crate::sftp::auth::strategy_for;
use crate::sftp::config::Credentials;
use crate::sftp::transport::{RemoteFs, SecureTransport, TransportHandle};

/// Keepalive interval for established transports
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Build russh client configuration.
///
/// Keepalives detect dead peers; there is no inactivity timeout.
///
/// * `compress` - Whether to offer zlib compression
pub(crate) fn build_client_config(compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(KEEPALIVE_INTERVAL),
        keepalive_max: 3,
        preferred,
        ..Default::default()
    })
}

/// [`SecureTransport`] over russh.
pub struct RusshTransport {
    config: Arc<client::Config>,
}

impl RusshTransport {
    pub fn new(compress: bool) -> Self {
        Self {
            config: build_client_config(compress),
        }
    }
}

impl Default for RusshTransport {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl SecureTransport for RusshTransport {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Box<dyn TransportHandle>, String> {
        let connect_future = client::connect(self.config.clone(), (host, port), SshClientHandler);

        let handle = tokio::time::timeout(timeout, connect_future)
            .await
            .map_err(|_| format!("Connection timed out after {:?}", timeout))?
            .map_err(|e| format!("Failed to connect: {}", e))?;

        debug!("SSH transport established to {}:{}", host, port);
        Ok(Box::new(RusshHandle {
            handle: Some(handle),
        }))
    }
}

/// An established russh transport.
pub struct RusshHandle {
    handle: Option<client::Handle<SshClientHandler>>,
}

impl RusshHandle {
    fn handle_mut(&mut self) -> Result<&mut client::Handle<SshClientHandler>, String> {
        self.handle
            .as_mut()
            .ok_or_else(|| "Transport already closed".to_string())
    }
}

#[async_trait]
impl TransportHandle for RusshHandle {
    async fn authenticate(&mut self, credentials: &Credentials<'_>) -> Result<bool, String> {
        let strategy = strategy_for(credentials);
        debug!("Trying authentication strategy: {}", strategy.name());

        let handle = self.handle_mut()?;
        strategy.authenticate(handle, credentials.username()).await
    }

    async fn open_subsystem(&mut self) -> Result<Box<dyn RemoteFs>, String> {
        let handle = self.handle_mut()?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| format!("Failed to open channel: {}", e))?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| format!("Failed to request SFTP subsystem: {}", e))?;

        let sftp = RusshSftpSession::new(channel.into_stream())
            .await
            .map_err(|e| format!("Failed to initialize SFTP session: {}", e))?;

        info!("SFTP subsystem started");
        Ok(Box::new(RusshRemoteFs::new(sftp)))
    }

    async fn close(&mut self) {
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle
                .disconnect(Disconnect::ByApplication, "Session closed by client", "en")
                .await
        {
            warn!("Error during disconnect: {}", e);
        }
    }
}
