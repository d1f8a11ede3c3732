//! Connection parameters for a single remote session

use std::fmt;
use std::time::Duration;

/// Connect timeout applied to TCP connect, handshake and authentication
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Secret used to authenticate against a node
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    PrivateKey {
        /// Private key in PEM/OpenSSH format
        pem: String,
        passphrase: Option<String>,
    },
}

impl Credential {
    pub fn password(password: impl Into<String>) -> Self {
        Credential::Password(password.into())
    }

    pub fn private_key(pem: impl Into<String>, passphrase: Option<String>) -> Self {
        Credential::PrivateKey {
            pem: pem.into(),
            passphrase,
        }
    }

    /// Short label for logs; never includes the secret
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Password(_) => "password",
            Credential::PrivateKey { .. } => "private-key",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::PrivateKey { passphrase, .. } => f
                .debug_struct("PrivateKey")
                .field("pem", &"<redacted>")
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Everything needed to open one session against one host
///
/// Built per call from a node record and handed down explicitly; no
/// credentials are kept anywhere else.
#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credential: Credential,
    pub connect_timeout: Duration,
}

impl SshTarget {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            credential,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `host:port`, bracketing IPv6 literals
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
