//! Authentication strategies for SSH connections.
//!
//! # Available Strategies
//!
//! - [`PasswordAuth`]: Password-based authentication
//! - [`KeyAuth`]: Key-pair authentication with optional passphrase
//!
//! [`strategy_for`] picks the one matching the configured credentials.

mod key;
mod password;
mod traits;

pub use key::KeyAuth;
pub use password::PasswordAuth;
pub use traits::AuthStrategy;

use crate::sftp::config::Credentials;

/// Build the authentication strategy for the selected credentials.
pub fn strategy_for<'a>(credentials: &Credentials<'a>) -> Box<dyn AuthStrategy + 'a> {
    match *credentials {
        Credentials::Password { password, .. } => Box::new(PasswordAuth::new(password)),
        Credentials::Key {
            public_key,
            private_key,
            passphrase,
            ..
        } => Box::new(KeyAuth::new(public_key, private_key, passphrase)),
    }
}
