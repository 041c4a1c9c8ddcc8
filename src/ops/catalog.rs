//! Named router operations and their arguments.
//!
//! Operations are looked up by name and their arguments deserialized from a
//! JSON object, then checked before anything is sent to the router.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// UCI configurations `read_config` may show.
pub const READABLE_CONFIGS: &[&str] = &["network", "wireless", "dhcp", "firewall", "system"];

/// Lowest and highest 2.4 GHz Thread channel.
pub const THREAD_CHANNELS: std::ops::RangeInclusive<u8> = 11..=26;

/// Broadcast PAN ID; never valid for a network.
pub const BROADCAST_PAN_ID: u16 = 0xffff;

const MAX_NETWORK_NAME: usize = 16;

/// Catalog entry describing one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperationInfo {
    pub name: &'static str,
    pub description: &'static str,
    /// Argument names; optional ones end in `?`.
    pub arguments: &'static [&'static str],
}

/// Every operation, in listing order.
pub const OPERATIONS: &[OperationInfo] = &[
    OperationInfo {
        name: "test_connection",
        description: "Open the SSH session if needed and run a test echo",
        arguments: &[],
    },
    OperationInfo {
        name: "execute_command",
        description: "Validate and run one command",
        arguments: &["command", "timeout_secs?"],
    },
    OperationInfo {
        name: "get_system_info",
        description: "Board, system info, uptime and load average",
        arguments: &[],
    },
    OperationInfo {
        name: "restart_interface",
        description: "Restart a network interface through ubus",
        arguments: &["interface"],
    },
    OperationInfo {
        name: "get_wifi_status",
        description: "Wireless radio and client status",
        arguments: &[],
    },
    OperationInfo {
        name: "list_dhcp_leases",
        description: "Parsed DHCP lease table",
        arguments: &[],
    },
    OperationInfo {
        name: "get_firewall_rules",
        description: "iptables filter table listing",
        arguments: &[],
    },
    OperationInfo {
        name: "read_config",
        description: "Show one UCI configuration",
        arguments: &["config_name"],
    },
    OperationInfo {
        name: "thread_get_state",
        description: "OpenThread role (disabled, detached, child, router, leader)",
        arguments: &[],
    },
    OperationInfo {
        name: "thread_create_network",
        description: "Form a new Thread network and return its credentials",
        arguments: &["network_name?", "channel?", "panid?"],
    },
    OperationInfo {
        name: "thread_get_dataset",
        description: "Active Thread dataset, plain and hex",
        arguments: &[],
    },
    OperationInfo {
        name: "thread_get_info",
        description: "Thread state, identifiers, addresses and tables",
        arguments: &[],
    },
    OperationInfo {
        name: "thread_enable_commissioner",
        description: "Start the commissioner and accept any joiner with a passphrase",
        arguments: &["passphrase?"],
    },
    OperationInfo {
        name: "opkg_update",
        description: "Refresh package lists",
        arguments: &[],
    },
    OperationInfo {
        name: "opkg_install",
        description: "Install a package",
        arguments: &["package_name"],
    },
    OperationInfo {
        name: "opkg_remove",
        description: "Remove a package",
        arguments: &["package_name"],
    },
    OperationInfo {
        name: "opkg_list_installed",
        description: "Installed packages with versions",
        arguments: &[],
    },
    OperationInfo {
        name: "opkg_info",
        description: "Package metadata",
        arguments: &["package_name"],
    },
    OperationInfo {
        name: "opkg_list_available",
        description: "Available packages, capped listing",
        arguments: &[],
    },
];

/// Look up a catalog entry by name.
pub fn find(name: &str) -> Option<&'static OperationInfo> {
    OPERATIONS.iter().find(|info| info.name == name)
}

/// Why an operation request was refused before running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("unknown operation '{0}'")]
    Unknown(String),

    #[error("invalid arguments for {operation}: {message}")]
    InvalidArguments {
        operation: &'static str,
        message: String,
    },
}

fn invalid(operation: &'static str, message: impl Into<String>) -> OperationError {
    OperationError::InvalidArguments {
        operation,
        message: message.into(),
    }
}

/// A parsed, checked operation request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    TestConnection,
    ExecuteCommand {
        command: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    GetSystemInfo,
    RestartInterface {
        interface: String,
    },
    GetWifiStatus,
    ListDhcpLeases,
    GetFirewallRules,
    ReadConfig {
        config_name: String,
    },
    ThreadGetState,
    ThreadCreateNetwork {
        #[serde(default = "default_network_name")]
        network_name: String,
        #[serde(default = "default_channel")]
        channel: u8,
        /// Random when absent.
        #[serde(default, deserialize_with = "pan_id")]
        panid: Option<u16>,
    },
    ThreadGetDataset,
    ThreadGetInfo,
    ThreadEnableCommissioner {
        #[serde(default = "default_passphrase")]
        passphrase: String,
    },
    OpkgUpdate,
    OpkgInstall {
        package_name: String,
    },
    OpkgRemove {
        package_name: String,
    },
    OpkgListInstalled,
    OpkgInfo {
        package_name: String,
    },
    OpkgListAvailable,
}

fn default_network_name() -> String {
    "OpenWRT-Thread".to_string()
}

fn default_channel() -> u8 {
    15
}

fn default_passphrase() -> String {
    "THREAD123".to_string()
}

/// Accepts `"0x1a2b"`, `"1a2b"` or a plain number.
fn pan_id<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u16),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(value)) => Ok(Some(value)),
        Some(Raw::Text(text)) => {
            let digits = text
                .strip_prefix("0x")
                .or_else(|| text.strip_prefix("0X"))
                .unwrap_or(&text);
            u16::from_str_radix(digits, 16)
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid PAN ID '{}'", text)))
        }
    }
}

impl Operation {
    /// Parse `args` (a JSON object, or null for none) for operation `name`.
    pub fn parse(name: &str, args: Value) -> Result<Self, OperationError> {
        let info = find(name).ok_or_else(|| OperationError::Unknown(name.to_string()))?;

        let mut object = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(invalid(info.name, "arguments must be a JSON object")),
        };
        object.insert("operation".into(), Value::String(info.name.into()));

        let operation: Self = serde_json::from_value(Value::Object(object))
            .map_err(|err| invalid(info.name, err.to_string()))?;
        operation.check()?;
        Ok(operation)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TestConnection => "test_connection",
            Self::ExecuteCommand { .. } => "execute_command",
            Self::GetSystemInfo => "get_system_info",
            Self::RestartInterface { .. } => "restart_interface",
            Self::GetWifiStatus => "get_wifi_status",
            Self::ListDhcpLeases => "list_dhcp_leases",
            Self::GetFirewallRules => "get_firewall_rules",
            Self::ReadConfig { .. } => "read_config",
            Self::ThreadGetState => "thread_get_state",
            Self::ThreadCreateNetwork { .. } => "thread_create_network",
            Self::ThreadGetDataset => "thread_get_dataset",
            Self::ThreadGetInfo => "thread_get_info",
            Self::ThreadEnableCommissioner { .. } => "thread_enable_commissioner",
            Self::OpkgUpdate => "opkg_update",
            Self::OpkgInstall { .. } => "opkg_install",
            Self::OpkgRemove { .. } => "opkg_remove",
            Self::OpkgListInstalled => "opkg_list_installed",
            Self::OpkgInfo { .. } => "opkg_info",
            Self::OpkgListAvailable => "opkg_list_available",
        }
    }

    /// Argument checks that serde cannot express.
    fn check(&self) -> Result<(), OperationError> {
        let name = self.name();
        match self {
            Self::RestartInterface { interface } => {
                if !is_interface_name(interface) {
                    return Err(invalid(name, "Invalid interface name"));
                }
            }
            Self::ReadConfig { config_name } => {
                if !READABLE_CONFIGS.contains(&config_name.as_str()) {
                    return Err(invalid(
                        name,
                        format!(
                            "Configuration '{}' not allowed. Allowed: {}",
                            config_name,
                            READABLE_CONFIGS.join(", ")
                        ),
                    ));
                }
            }
            Self::ThreadCreateNetwork {
                network_name,
                channel,
                panid,
            } => {
                if !is_token(network_name) {
                    return Err(invalid(
                        name,
                        "Invalid network name. Use only alphanumeric, dash, and underscore.",
                    ));
                }
                if network_name.len() > MAX_NETWORK_NAME {
                    return Err(invalid(
                        name,
                        format!("Network name must be at most {} characters", MAX_NETWORK_NAME),
                    ));
                }
                if !THREAD_CHANNELS.contains(channel) {
                    return Err(invalid(name, "Channel must be between 11 and 26"));
                }
                if *panid == Some(BROADCAST_PAN_ID) {
                    return Err(invalid(name, "PAN ID 0xffff is reserved for broadcast"));
                }
            }
            Self::ThreadEnableCommissioner { passphrase } => {
                if !is_token(passphrase) || !(6..=32).contains(&passphrase.len()) {
                    return Err(invalid(
                        name,
                        "Passphrase must be 6 to 32 alphanumeric, dash, or underscore characters",
                    ));
                }
            }
            Self::OpkgInstall { package_name }
            | Self::OpkgRemove { package_name }
            | Self::OpkgInfo { package_name } => {
                if !is_package_name(package_name) {
                    return Err(invalid(
                        name,
                        "Invalid package name. Use only alphanumeric characters, dash, underscore, and dot.",
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn is_interface_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// A leading dash would reach opkg as an option.
fn is_package_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
