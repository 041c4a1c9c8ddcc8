//! Parsers for router command output.

use std::collections::BTreeMap;

use serde::Serialize;

/// One line of the dnsmasq lease file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpLease {
    /// Expiry, seconds since the epoch.
    pub timestamp: String,
    pub mac: String,
    pub ip: String,
    pub hostname: String,
    pub client_id: String,
}

/// Parse `/tmp/dhcp.leases`. Lines with fewer than four fields are skipped.
pub fn dhcp_leases(text: &str) -> Vec<DhcpLease> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            Some(DhcpLease {
                timestamp: fields[0].to_string(),
                mac: fields[1].to_string(),
                ip: fields[2].to_string(),
                hostname: fields[3].to_string(),
                client_id: fields.get(4).map(|s| s.to_string()).unwrap_or_default(),
            })
        })
        .collect()
}

/// A package line from `opkg list` or `opkg list-installed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Parse one `name - version[ - description]` line.
pub fn package_line(line: &str) -> Option<Package> {
    let mut parts = line.splitn(3, " - ");
    let name = parts.next()?.trim();
    let version = parts.next()?.trim();
    if name.is_empty() {
        return None;
    }
    Some(Package {
        name: name.to_string(),
        version: version.to_string(),
        description: parts.next().map(|s| s.trim().to_string()),
    })
}

pub fn packages(text: &str) -> Vec<Package> {
    text.lines().filter_map(package_line).collect()
}

/// Parse `opkg info` output into snake_case keys. Continuation lines are dropped.
pub fn package_info(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(": "))
        .map(|(key, value)| (key.to_lowercase().replace(' ', "_"), value.to_string()))
        .collect()
}

/// Parse JSON output, falling back to the raw text.
pub fn json_or_text(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}
