//! Connection configuration for SFTP sessions.
//!
//! [`ConnectionConfig`] is built once and handed to the session at
//! construction. The session never mutates it, so "intent to authenticate"
//! stays separate from "authenticated session".
//!
//! Tunables follow a three-tier priority system:
//!
//! 1. **Parameter** - Explicitly provided value (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SFTP_CONNECT_TIMEOUT` | 30s | Connection timeout in seconds |
//! | `SFTP_COMPRESSION` | false | Offer zlib compression |
//! | `SFTP_TMP_PREFIX` | `sftp-` | Prefix of generated download filenames |

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::sftp::error::{Result, SftpError};

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Default mode bits for `mkdir`
pub const DEFAULT_DIR_PERMISSIONS: u32 = 0o777;

/// Default SSH connection timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default prefix of temporary download filenames
pub(crate) const DEFAULT_TMP_PREFIX: &str = "sftp-";

/// Environment variable name for the connection timeout
pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "SFTP_CONNECT_TIMEOUT";

/// Environment variable name for compression
pub(crate) const COMPRESSION_ENV_VAR: &str = "SFTP_COMPRESSION";

/// Environment variable name for the temporary filename prefix
pub(crate) const TMP_PREFIX_ENV_VAR: &str = "SFTP_TMP_PREFIX";

/// Username/password login.
pub struct PasswordLogin {
    pub username: String,
    pub password: SecretString,
}

/// Username/key-pair login with optional passphrase.
pub struct KeyLogin {
    pub username: String,
    pub public_key: PathBuf,
    pub private_key: PathBuf,
    pub passphrase: Option<SecretString>,
}

/// Credentials selected for one connection attempt.
pub enum Credentials<'a> {
    Password {
        username: &'a str,
        password: &'a SecretString,
    },
    Key {
        username: &'a str,
        public_key: &'a Path,
        private_key: &'a Path,
        passphrase: Option<&'a SecretString>,
    },
}

impl Credentials<'_> {
    pub fn username(&self) -> &str {
        match self {
            Credentials::Password { username, .. } | Credentials::Key { username, .. } => username,
        }
    }

    /// Name of the authentication method, for logging.
    pub fn method(&self) -> &'static str {
        match self {
            Credentials::Password { .. } => "password",
            Credentials::Key { .. } => "key",
        }
    }
}

impl fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Credentials::Key {
                username,
                public_key,
                private_key,
                passphrase,
            } => f
                .debug_struct("Key")
                .field("username", username)
                .field("public_key", public_key)
                .field("private_key", private_key)
                .field("passphrase", &passphrase.map(|_| "[REDACTED]"))
                .finish(),
        }
    }
}

/// Immutable description of where and how to connect.
pub struct ConnectionConfig {
    host: String,
    port: u16,
    password_login: Option<PasswordLogin>,
    key_login: Option<KeyLogin>,
    tmp_prefix: String,
    connect_timeout: Duration,
    compression: bool,
}

impl ConnectionConfig {
    /// Configuration for `host` on the default port, with tunables resolved
    /// from the environment.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            password_login: None,
            key_login: None,
            tmp_prefix: resolve_tmp_prefix(None),
            connect_timeout: Duration::from_secs(resolve_connect_timeout(None)),
            compression: resolve_compression(None),
        }
    }

    /// Configuration from a `host:port` or `host` address string.
    pub fn from_address(address: &str) -> Result<Self> {
        let (host, port) = parse_address(address)?;
        Ok(Self::new(host).port(port))
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Store a password login.
    pub fn configure_login(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.password_login = Some(PasswordLogin {
            username: username.into(),
            password: SecretString::from(password.into()),
        });
        self
    }

    /// Store a key-pair login. Takes precedence over a password login when
    /// both key paths are non-empty.
    pub fn configure_key_login(
        mut self,
        username: impl Into<String>,
        public_key: impl Into<PathBuf>,
        private_key: impl Into<PathBuf>,
        passphrase: Option<String>,
    ) -> Self {
        self.key_login = Some(KeyLogin {
            username: username.into(),
            public_key: public_key.into(),
            private_key: private_key.into(),
            passphrase: passphrase.map(SecretString::from),
        });
        self
    }

    pub fn tmp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tmp_prefix = prefix.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub fn get_tmp_prefix(&self) -> &str {
        &self.tmp_prefix
    }

    pub fn get_connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn compression_enabled(&self) -> bool {
        self.compression
    }

    /// Select the credentials for a connection attempt.
    ///
    /// The key login wins when both of its paths are populated, otherwise
    /// the password login is used.
    pub fn credentials(&self) -> Option<Credentials<'_>> {
        if let Some(key) = &self.key_login
            && !key.public_key.as_os_str().is_empty()
            && !key.private_key.as_os_str().is_empty()
        {
            return Some(Credentials::Key {
                username: &key.username,
                public_key: &key.public_key,
                private_key: &key.private_key,
                passphrase: key.passphrase.as_ref(),
            });
        }

        self.password_login
            .as_ref()
            .map(|login| Credentials::Password {
                username: &login.username,
                password: &login.password,
            })
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credentials", &self.credentials())
            .field("tmp_prefix", &self.tmp_prefix)
            .field("connect_timeout", &self.connect_timeout)
            .field("compression", &self.compression)
            .finish()
    }
}

/// Parse address string into host and port components.
///
/// Supports `host:port` and `host` (default port 22). Uses `rsplit_once`
/// so bracketed IPv6 addresses such as `[::1]:22` keep their colons.
pub fn parse_address(address: &str) -> Result<(String, u16)> {
    if let Some((host, port_str)) = address.rsplit_once(':') {
        if host.contains(':') && !host.starts_with('[') {
            // Bare IPv6 literal without a port
            return Ok((address.to_string(), DEFAULT_PORT));
        }
        let port = port_str
            .parse::<u16>()
            .map_err(|e| SftpError::InvalidAddress {
                address: address.to_string(),
                reason: format!("Invalid port number: {}", e),
            })?;
        Ok((host.to_string(), port))
    } else {
        Ok((address.to_string(), DEFAULT_PORT))
    }
}

/// Resolve the connection timeout with priority: parameter -> env var -> default
pub(crate) fn resolve_connect_timeout(timeout_param: Option<u64>) -> u64 {
    if let Some(timeout) = timeout_param {
        return timeout;
    }

    if let Ok(env_timeout) = env::var(CONNECT_TIMEOUT_ENV_VAR)
        && let Ok(timeout) = env_timeout.parse::<u64>()
    {
        return timeout;
    }

    DEFAULT_CONNECT_TIMEOUT_SECS
}

/// Resolve the compression setting with priority: parameter -> env var -> default (false)
pub(crate) fn resolve_compression(compress_param: Option<bool>) -> bool {
    if let Some(compress) = compress_param {
        return compress;
    }

    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    false
}

/// Resolve the download prefix with priority: parameter -> env var -> default
pub(crate) fn resolve_tmp_prefix(prefix_param: Option<&str>) -> String {
    if let Some(prefix) = prefix_param {
        return prefix.to_string();
    }

    // An empty value is a valid prefix
    if let Ok(env_prefix) = env::var(TMP_PREFIX_ENV_VAR) {
        return env_prefix;
    }

    DEFAULT_TMP_PREFIX.to_string()
}

// Every test that reads or writes `SFTP_*` variables, including through
// `ConnectionConfig::new`, holds this lock
#[cfg(test)]
static ENV_TEST_MUTEX: once_cell::sync::Lazy<std::sync::Mutex<()>> =
    once_cell::sync::Lazy::new(|| std::sync::Mutex::new(()));

/// Lock the test environment. A panicking holder does not poison it for
/// later tests.
#[cfg(test)]
pub(crate) fn env_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_TEST_MUTEX
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// [`ConnectionConfig::new`] with the environment read under [`env_guard`].
#[cfg(test)]
pub(crate) fn test_config(host: &str) -> ConnectionConfig {
    let _guard = env_guard();
    ConnectionConfig::new(host)
}
