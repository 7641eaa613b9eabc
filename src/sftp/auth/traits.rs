//! The seam between credential kinds and the russh handle.

use async_trait::async_trait;
use russh::client;

use crate::sftp::native::SshClientHandler;

/// One way of proving identity on an established transport.
///
/// [`strategy_for`](super::strategy_for) builds exactly one per connection
/// attempt; there is no fallback chain.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Offer the credentials for `username`.
    ///
    /// `Ok(false)` means the server said no. `Err` means the attempt could
    /// not be made, e.g. the private key did not load.
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, String>;

    /// Short method name used in log lines.
    fn name(&self) -> &'static str;
}
