//! Connection target: endpoint, credential and timeouts.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Single authentication method used for the router.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Private key file.
    KeyFile(PathBuf),
    /// Plain password.
    Password(String),
}

impl Credential {
    /// Short name for logs; never includes the secret.
    pub fn method(&self) -> &'static str {
        match self {
            Self::KeyFile(_) => "key-based",
            Self::Password(_) => "password",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            Self::Password(_) => f.write_str("Password(***)"),
        }
    }
}

/// How the router's host key is verified.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Accept whatever key the router presents.
    #[default]
    AcceptAny,
    /// Require the SHA-256 fingerprint to match.
    Fingerprint(String),
}

impl HostKeyPolicy {
    /// Check a presented key fingerprint against the policy.
    ///
    /// Fingerprints compare with an optional `SHA256:` prefix stripped.
    pub fn accepts(&self, fingerprint: &str) -> bool {
        match self {
            Self::AcceptAny => true,
            Self::Fingerprint(expected) => {
                let strip = |s: &str| s.trim().trim_start_matches("SHA256:").to_string();
                strip(expected) == strip(fingerprint)
            }
        }
    }
}

/// Everything needed to open the router session.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credential: Credential,
    pub host_key_policy: HostKeyPolicy,
    pub connect_timeout: Duration,
    pub keepalive_interval: Duration,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>, credential: Credential) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            credential,
            host_key_policy: HostKeyPolicy::default(),
            connect_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(15),
        }
    }

    /// `user@host:port`, used in audit records.
    pub fn endpoint(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}
