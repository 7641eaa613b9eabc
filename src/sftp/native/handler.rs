//! russh client handler.

use russh::{client, keys};

/// Client handler for russh that accepts all host keys.
///
/// Equivalent to `StrictHostKeyChecking=no` in OpenSSH. Host key
/// verification is the transport's concern and is not modeled here.
pub struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}
