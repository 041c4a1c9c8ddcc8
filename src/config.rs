//! Configuration management for openwrt-gate.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::policy::RuleSpec;
use crate::session::{Credential, HostKeyPolicy, Target};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Router to manage.
    pub target: TargetSection,
    /// SSH connection settings.
    pub ssh: SshSection,
    /// Command validation settings.
    pub security: SecuritySection,
    /// Audit trail settings.
    pub audit: AuditSection,
    /// HTTP API settings.
    pub server: ServerSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Router endpoint and credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub key_file: Option<PathBuf>,
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            host: "192.168.1.1".to_string(),
            port: 22,
            user: "root".to_string(),
            password: None,
            key_file: None,
        }
    }
}

impl std::fmt::Debug for TargetSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetSection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("key_file", &self.key_file)
            .finish()
    }
}

/// Host key verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyMode {
    /// Accept any host key (LAN default).
    #[default]
    AcceptAny,
    /// Pin the SHA-256 fingerprint in `host_key_fingerprint`.
    Fingerprint,
}

/// SSH connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSection {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Keepalive interval in seconds.
    pub keepalive_interval_secs: u64,
    /// Per-command deadline in seconds.
    pub command_timeout_secs: u64,
    pub host_key_policy: HostKeyMode,
    pub host_key_fingerprint: Option<String>,
    /// Extra connect attempts before a command gives up.
    pub reconnect_attempts: u32,
}

impl Default for SshSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            keepalive_interval_secs: 15,
            command_timeout_secs: 30,
            host_key_policy: HostKeyMode::AcceptAny,
            host_key_fingerprint: None,
            reconnect_attempts: 1,
        }
    }
}

impl SshSection {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Command validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// Enforce the command policy.
    pub validation_enabled: bool,
    /// Additional deny rules, evaluated after the built-ins.
    pub extra_deny: Vec<RuleSpec>,
    /// Additional allow rules, evaluated after the built-ins.
    pub extra_allow: Vec<RuleSpec>,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            validation_enabled: true,
            extra_deny: Vec::new(),
            extra_allow: Vec::new(),
        }
    }
}

/// Audit trail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSection {
    pub enabled: bool,
    pub log_file: PathBuf,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            enabled: true,
            log_file: PathBuf::from("openwrt_gate_audit.log"),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Accepted bearer keys; authentication is off when empty.
    pub api_keys: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            api_keys: Vec::new(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> Option<bool> {
    env_var(name).map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|v| v.parse().ok())
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Some(host) = env_var("OPENWRT_HOST") {
            self.target.host = host;
        }
        if let Some(port) = env_parse("OPENWRT_PORT") {
            self.target.port = port;
        }
        if let Some(user) = env_var("OPENWRT_USER") {
            self.target.user = user;
        }
        if let Some(password) = env_var("OPENWRT_PASSWORD") {
            self.target.password = Some(password);
        }
        if let Some(key_file) = env_var("OPENWRT_KEY_FILE") {
            self.target.key_file = Some(PathBuf::from(key_file));
        }

        if let Some(secs) = env_parse("SSH_TIMEOUT") {
            self.ssh.connect_timeout_secs = secs;
            self.ssh.command_timeout_secs = secs;
        }
        if let Some(secs) = env_parse("SSH_COMMAND_TIMEOUT") {
            self.ssh.command_timeout_secs = secs;
        }
        if let Some(secs) = env_parse("SSH_KEEPALIVE_INTERVAL") {
            self.ssh.keepalive_interval_secs = secs;
        }
        if let Some(policy) = env_var("SSH_HOST_KEY_POLICY") {
            match policy.as_str() {
                "accept_any" => self.ssh.host_key_policy = HostKeyMode::AcceptAny,
                "fingerprint" => self.ssh.host_key_policy = HostKeyMode::Fingerprint,
                other => tracing::warn!(policy = other, "ignoring unknown SSH_HOST_KEY_POLICY"),
            }
        }
        if let Some(fingerprint) = env_var("SSH_HOST_KEY_FINGERPRINT") {
            self.ssh.host_key_fingerprint = Some(fingerprint);
        }

        if let Some(enabled) = env_flag("ENABLE_COMMAND_VALIDATION") {
            self.security.validation_enabled = enabled;
        }
        if let Some(enabled) = env_flag("ENABLE_AUDIT_LOGGING") {
            self.audit.enabled = enabled;
        }
        if let Some(path) = env_var("LOG_FILE") {
            self.audit.log_file = PathBuf::from(path);
        }

        if let Some(host) = env_var("GATE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse("GATE_PORT") {
            self.server.port = port;
        }
        if let Some(key) = env_var("GATE_API_KEY") {
            if !self.server.api_keys.contains(&key) {
                self.server.api_keys.push(key);
            }
        }

        if let Some(level) = env_var("GATE_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = env_var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(ref target) = args.target {
            self.target.host = target.clone();
        }
        if let Some(ref user) = args.user {
            self.target.user = user.clone();
        }
        if let Some(ref identity) = args.identity {
            self.target.key_file = Some(identity.clone());
        }
        if let Some(ref key) = args.api_key {
            self.server.api_keys = vec![key.clone()];
        }
        if args.no_validation {
            self.security.validation_enabled = false;
        }
        if args.no_audit {
            self.audit.enabled = false;
        }
        if let Some(ref path) = args.audit_file {
            self.audit.log_file = path.clone();
        }
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Resolve the connection target.
    ///
    /// Exactly one credential is used: the key file when set, otherwise the
    /// password. Having neither is an error.
    pub fn target(&self) -> Result<Target, ConfigError> {
        let credential = match (&self.target.key_file, &self.target.password) {
            (Some(key_file), password) => {
                if password.is_some() {
                    tracing::warn!("both key file and password configured; using key file");
                }
                Credential::KeyFile(key_file.clone())
            }
            (None, Some(password)) => Credential::Password(password.clone()),
            (None, None) => return Err(ConfigError::MissingCredential),
        };

        let host_key_policy = match self.ssh.host_key_policy {
            HostKeyMode::AcceptAny => HostKeyPolicy::AcceptAny,
            HostKeyMode::Fingerprint => match &self.ssh.host_key_fingerprint {
                Some(fingerprint) => HostKeyPolicy::Fingerprint(fingerprint.clone()),
                None => {
                    return Err(ConfigError::InvalidValue(
                        "ssh.host_key_fingerprint",
                        "required when host_key_policy is \"fingerprint\"".to_string(),
                    ))
                }
            },
        };

        if self.target.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue("target.host", "must not be empty".to_string()));
        }

        Ok(Target {
            host: self.target.host.clone(),
            port: self.target.port,
            user: self.target.user.clone(),
            credential,
            host_key_policy,
            connect_timeout: Duration::from_secs(self.ssh.connect_timeout_secs),
            keepalive_interval: Duration::from_secs(self.ssh.keepalive_interval_secs),
        })
    }

    /// `host:port` for the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Neither password nor key file configured.
    MissingCredential,
    /// A field has an unusable value.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::MissingCredential => write!(
                f,
                "Either OPENWRT_PASSWORD or OPENWRT_KEY_FILE must be configured"
            ),
            Self::InvalidValue(field, reason) => write!(f, "invalid {}: {}", field, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::GatewayError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.target.host, "192.168.1.1");
        assert_eq!(config.target.port, 22);
        assert_eq!(config.target.user, "root");
        assert_eq!(config.ssh.connect_timeout_secs, 30);
        assert_eq!(config.ssh.keepalive_interval_secs, 15);
        assert!(config.security.validation_enabled);
        assert!(config.audit.enabled);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "target": {
                "host": "10.0.0.1",
                "password": "secret"
            },
            "security": {
                "validation_enabled": false,
                "extra_allow": [{"name": "logread", "pattern": "logread"}]
            },
            "audit": {
                "log_file": "/var/log/gate.log"
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.target.host, "10.0.0.1");
        assert_eq!(config.target.port, 22); // Default
        assert_eq!(config.target.password.as_deref(), Some("secret"));
        assert!(!config.security.validation_enabled);
        assert_eq!(config.security.extra_allow.len(), 1);
        assert_eq!(config.audit.log_file, PathBuf::from("/var/log/gate.log"));
        assert!(config.audit.enabled);
    }

    #[test]
    fn test_target_requires_credential() {
        let config = Config::default();
        assert!(matches!(config.target(), Err(ConfigError::MissingCredential)));
    }

    #[test]
    fn test_target_prefers_key_over_password() {
        let mut config = Config::default();
        config.target.password = Some("pw".into());
        config.target.key_file = Some(PathBuf::from("/root/.ssh/id_ed25519"));

        let target = config.target().unwrap();
        assert_eq!(
            target.credential,
            Credential::KeyFile(PathBuf::from("/root/.ssh/id_ed25519"))
        );
    }

    #[test]
    fn test_target_password_only() {
        let mut config = Config::default();
        config.target.password = Some("pw".into());

        let target = config.target().unwrap();
        assert_eq!(target.credential, Credential::Password("pw".into()));
        assert_eq!(target.connect_timeout, Duration::from_secs(30));
        assert_eq!(target.host_key_policy, HostKeyPolicy::AcceptAny);
    }

    #[test]
    fn test_fingerprint_policy_requires_fingerprint() {
        let mut config = Config::default();
        config.target.password = Some("pw".into());
        config.ssh.host_key_policy = HostKeyMode::Fingerprint;
        assert!(matches!(config.target(), Err(ConfigError::InvalidValue(..))));

        config.ssh.host_key_fingerprint = Some("SHA256:abc".into());
        assert_eq!(
            config.target().unwrap().host_key_policy,
            HostKeyPolicy::Fingerprint("SHA256:abc".into())
        );
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            host: Some("0.0.0.0".parse().unwrap()),
            port: Some(8080),
            target: Some("10.1.1.1".into()),
            identity: Some(PathBuf::from("/keys/router")),
            no_validation: true,
            no_audit: true,
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.target.host, "10.1.1.1");
        assert_eq!(config.target.key_file, Some(PathBuf::from("/keys/router")));
        assert!(!config.security.validation_enabled);
        assert!(!config.audit.enabled);
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = Config::default();
        config.target.password = Some("hunter2".into());
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_missing_credential_message() {
        let err = ConfigError::MissingCredential;
        assert!(err.to_string().contains("OPENWRT_PASSWORD"));
        let gateway_err: crate::error::GatewayError = err.into();
        assert!(matches!(gateway_err, crate::error::GatewayError::Configuration(_)));
    }
}
