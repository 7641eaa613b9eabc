//! Password-based SSH authentication.

use async_trait::async_trait;
use russh::client;
use secrecy::{ExposeSecret, SecretString};

use crate::sftp::native::SshClientHandler;

use super::traits::AuthStrategy;

/// Password authentication strategy.
pub struct PasswordAuth<'a> {
    password: &'a SecretString,
}

impl<'a> PasswordAuth<'a> {
    pub fn new(password: &'a SecretString) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuth<'_> {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, String> {
        // Expose the secret only at the point of authentication
        let result = handle
            .authenticate_password(username, self.password.expose_secret())
            .await
            .map_err(|e| format!("Password authentication failed: {}", e))?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "password"
    }
}
