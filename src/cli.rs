//! Command-line interface for openwrt-gate.
//!
//! Uses lexopt to keep the binary small.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

/// Command-line arguments.
///
/// Every field is optional so that unset flags fall through to the
/// environment and the config file.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Address for the HTTP API to bind to.
    pub host: Option<IpAddr>,
    /// Port for the HTTP API.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Router host name or address.
    pub target: Option<String>,
    /// Router login user.
    pub user: Option<String>,
    /// Private key file for the router login.
    pub identity: Option<PathBuf>,
    /// API key for the HTTP API.
    pub api_key: Option<String>,
    /// Disable command validation.
    pub no_validation: bool,
    /// Disable the audit trail.
    pub no_audit: bool,
    /// Audit trail file.
    pub audit_file: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('t') | Long("target") => {
                result.target = Some(parser.value()?.parse()?);
            }
            Short('u') | Long("user") => {
                result.user = Some(parser.value()?.parse()?);
            }
            Short('i') | Long("identity") => {
                result.identity = Some(parser.value()?.parse()?);
            }
            Short('k') | Long("api-key") => {
                result.api_key = Some(parser.value()?.parse()?);
            }
            Long("no-validation") => {
                result.no_validation = true;
            }
            Long("no-audit") => {
                result.no_audit = true;
            }
            Long("audit-file") => {
                result.audit_file = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"openwrt-gate {version}
Policy-enforcing command gateway for OpenWrt routers

USAGE:
    openwrt-gate [OPTIONS]

OPTIONS:
    -H, --host <ADDR>        API bind address [default: 127.0.0.1]
    -p, --port <PORT>        API port [default: 3000]
    -c, --config <FILE>      Path to configuration file (JSON)
    -t, --target <HOST>      Router address [default: 192.168.1.1]
    -u, --user <USER>        Router login user [default: root]
    -i, --identity <FILE>    Private key for the router login
    -k, --api-key <KEY>      API key required by the HTTP API
    -l, --log-level <LVL>    Log level (error, warn, info, debug, trace)
        --no-validation      Disable command validation (audited)
        --no-audit           Disable the audit trail
        --audit-file <FILE>  Audit trail file [default: openwrt_gate_audit.log]
    -h, --help               Print help
    -V, --version            Print version

ENVIRONMENT VARIABLES:
    OPENWRT_HOST               Router address
    OPENWRT_PORT               Router SSH port
    OPENWRT_USER               Router login user
    OPENWRT_PASSWORD           Router password
    OPENWRT_KEY_FILE           Private key file (preferred over password)
    SSH_TIMEOUT                Connect and command timeout in seconds
    SSH_COMMAND_TIMEOUT        Command timeout in seconds
    SSH_KEEPALIVE_INTERVAL     Keepalive interval in seconds
    SSH_HOST_KEY_POLICY        accept_any | fingerprint
    SSH_HOST_KEY_FINGERPRINT   Pinned SHA256 host key fingerprint
    ENABLE_COMMAND_VALIDATION  true | false
    ENABLE_AUDIT_LOGGING       true | false
    LOG_FILE                   Audit trail file
    GATE_HOST, GATE_PORT       API bind address and port
    GATE_API_KEY               API key
    GATE_LOG_LEVEL, RUST_LOG   Log level

EXAMPLES:
    # Password login from the environment
    OPENWRT_PASSWORD=secret openwrt-gate

    # Key login to a specific router
    openwrt-gate -t 10.0.0.1 -i ~/.ssh/id_ed25519

    # Start with config file
    openwrt-gate -c /etc/openwrt-gate/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("openwrt-gate {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
