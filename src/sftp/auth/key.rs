//! Key-pair SSH authentication.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::sftp::native::SshClientHandler;

use super::traits::AuthStrategy;

/// Key-pair authentication strategy.
///
/// Loads the private key (decrypting it with the passphrase when given) and
/// checks that it matches the configured public key before offering it.
pub struct KeyAuth<'a> {
    public_key: &'a Path,
    private_key: &'a Path,
    passphrase: Option<&'a SecretString>,
}

impl<'a> KeyAuth<'a> {
    pub fn new(
        public_key: &'a Path,
        private_key: &'a Path,
        passphrase: Option<&'a SecretString>,
    ) -> Self {
        Self {
            public_key,
            private_key,
            passphrase,
        }
    }

    fn load_key_pair(&self) -> Result<keys::PrivateKey, String> {
        let passphrase = self.passphrase.map(|p| p.expose_secret());
        let key_pair = keys::load_secret_key(self.private_key, passphrase).map_err(|e| {
            format!(
                "Failed to load private key from {}: {}",
                self.private_key.display(),
                e
            )
        })?;

        match keys::load_public_key(self.public_key) {
            Ok(public) if public.key_data() == key_pair.public_key().key_data() => Ok(key_pair),
            Ok(_) => Err(format!(
                "Public key {} does not match private key {}",
                self.public_key.display(),
                self.private_key.display()
            )),
            Err(e) => {
                // The server only needs the private key; an unreadable .pub is not fatal
                warn!(
                    "Could not read public key {}: {}. Deriving it from the private key",
                    self.public_key.display(),
                    e
                );
                Ok(key_pair)
            }
        }
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth<'_> {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, String> {
        let key_pair = self.load_key_pair()?;

        // For RSA keys, use the best supported hash algorithm
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        debug!("Using RSA hash algorithm for key auth: {:?}", hash_alg);

        let key_with_hash = keys::PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg);

        let result = handle
            .authenticate_publickey(username, key_with_hash)
            .await
            .map_err(|e| format!("Key authentication failed: {}", e))?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "key"
    }
}
