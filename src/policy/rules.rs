//! Built-in deny and allow tables.
//!
//! Each entry is `(rule name, pattern)`. Order is significant: the first
//! matching entry is the one reported.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::Result;

/// Dangerous constructs, matched case-insensitively anywhere in the command.
pub const DENY_RULES: &[(&str, &str)] = &[
    ("recursive-force-delete", r"rm\s+-rf"),
    ("raw-disk-copy", r"dd\s+if="),
    ("filesystem-format", r"mkfs"),
    ("system-shutdown", r"shutdown"),
    ("system-reboot", r"reboot"),
    ("system-halt", r"halt"),
    ("system-poweroff", r"poweroff"),
    ("block-device-write", r">/dev/sd"),
    ("world-writable-permissions", r"chmod\s+777"),
    ("credential-change", r"passwd"),
    ("ssh-server-stop", r"dropbear.*stop"),
    ("ssh-server-kill", r"killall\s+dropbear"),
    ("fetch-and-execute-wget", r"wget.*\|.*sh"),
    ("fetch-and-execute-curl", r"curl.*\|.*sh"),
    ("netcat-pipe", r"\|.*nc\s+"),
    ("telnet", r"telnet"),
];

/// Exact permitted command shapes. Anchoring is added at compile time.
pub const ALLOW_RULES: &[(&str, &str)] = &[
    // ubus service bus
    ("ubus-interface-call", r"ubus call network\.interface\.\w+ \w+"),
    ("ubus-wireless-status", r"ubus call network\.wireless status"),
    ("ubus-system-board", r"ubus call system board"),
    ("ubus-system-info", r"ubus call system info"),
    ("ubus-list", r"ubus list( [\w.]+)?"),
    // uci configuration reads
    ("uci-show-network", r"uci show network"),
    ("uci-show-wireless", r"uci show wireless"),
    ("uci-show-dhcp", r"uci show dhcp"),
    ("uci-show-firewall", r"uci show firewall"),
    ("uci-show-system", r"uci show system"),
    ("uci-get", r"uci get \w+\.[\w.@\[\]-]+"),
    // read-only system information
    ("proc-read", r"cat /proc/(uptime|meminfo|cpuinfo|loadavg)"),
    ("openwrt-release", r"cat /etc/openwrt_release"),
    ("ip-addr", r"ip addr show"),
    ("ip-route", r"ip route show"),
    ("disk-free", r"df -h"),
    ("memory-free", r"free"),
    ("uptime", r"uptime"),
    // dhcp leases
    ("dhcp-leases-tmp", r"cat /tmp/dhcp\.leases"),
    ("dhcp-leases-var", r"cat /var/dhcp\.leases"),
    // firewall listings
    ("iptables-filter", r"iptables -L -n -v"),
    ("iptables-nat", r"iptables -t nat -L -n -v"),
    // processes
    ("ps", r"ps"),
    ("ps-wide", r"ps w"),
    ("top-snapshot", r"top -n 1 -b"),
    // network diagnostics
    ("ping", r"ping -c \d{1,3} [\w.\-]+"),
    ("traceroute", r"traceroute [\w.\-]+"),
    ("nslookup", r"nslookup [\w.\-]+"),
    // OpenThread border router
    ("ot-state", r"(/usr/sbin/)?ot-ctl state"),
    ("ot-channel", r"(/usr/sbin/)?ot-ctl channel( \d{1,2})?"),
    ("ot-panid", r"(/usr/sbin/)?ot-ctl panid( 0x[0-9a-fA-F]{1,4})?"),
    ("ot-networkkey", r"(/usr/sbin/)?ot-ctl networkkey( [0-9a-fA-F]{32})?"),
    ("ot-networkname", r"(/usr/sbin/)?ot-ctl networkname( [\w\-]{1,16})?"),
    ("ot-extpanid", r"(/usr/sbin/)?ot-ctl extpanid( [0-9a-fA-F]{16})?"),
    ("ot-ifconfig", r"(/usr/sbin/)?ot-ctl ifconfig( up| down)?"),
    ("ot-thread", r"(/usr/sbin/)?ot-ctl thread (start|stop)"),
    ("ot-dataset-init", r"(/usr/sbin/)?ot-ctl dataset init new"),
    ("ot-dataset-commit", r"(/usr/sbin/)?ot-ctl dataset commit active"),
    ("ot-dataset-show", r"(/usr/sbin/)?ot-ctl dataset (active|pending)( -x)?"),
    ("ot-dataset-set", r"(/usr/sbin/)?ot-ctl dataset set active [0-9a-fA-F]+"),
    ("ot-prefix-add", r"(/usr/sbin/)?ot-ctl prefix add [\da-fA-F:]+/\d{1,3} paros"),
    ("ot-prefix", r"(/usr/sbin/)?ot-ctl prefix"),
    ("ot-tables", r"(/usr/sbin/)?ot-ctl (neighbor|router|child) table"),
    ("ot-ipaddr", r"(/usr/sbin/)?ot-ctl ipaddr"),
    ("ot-rloc16", r"(/usr/sbin/)?ot-ctl rloc16"),
    ("ot-leaderdata", r"(/usr/sbin/)?ot-ctl leaderdata"),
    ("ot-commissioner", r"(/usr/sbin/)?ot-ctl commissioner (start|stop)"),
    ("ot-joiner-add", r"(/usr/sbin/)?ot-ctl commissioner joiner add \* [\w\-]+"),
    // opkg package management
    ("opkg-update", r"opkg update"),
    ("opkg-list", r"opkg (list|list-installed|list-upgradable)"),
    ("opkg-package", r"opkg (info|install|remove|upgrade|search) [a-zA-Z0-9._-]+"),
];

/// A rule definition as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Intent name reported when the rule fires.
    pub name: String,
    /// Regular expression.
    pub pattern: String,
}

impl RuleSpec {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

/// Whether a rule rejects or permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Deny,
    Allow,
}

/// A compiled policy rule: intent name plus pattern.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    name: String,
    source: String,
    regex: Regex,
}

impl PolicyRule {
    /// Compile a rule.
    ///
    /// Deny rules are unanchored and case-insensitive. Allow rules are
    /// anchored to the whole command.
    pub fn compile(name: &str, pattern: &str, kind: RuleKind) -> Result<Self> {
        let regex = match kind {
            RuleKind::Deny => RegexBuilder::new(pattern).case_insensitive(true).build(),
            RuleKind::Allow => Regex::new(&format!("^(?:{})$", pattern)),
        }
        .map_err(|source| GatewayError::InvalidPattern {
            rule: name.to_string(),
            source,
        })?;

        Ok(Self {
            name: name.to_string(),
            source: pattern.to_string(),
            regex,
        })
    }

    /// Intent name of this rule.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pattern as written, without added anchors.
    pub fn pattern(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, command: &str) -> bool {
        self.regex.is_match(command)
    }
}

/// Compile a table of rules, built-ins first, extras after.
pub fn compile_table(
    builtin: &[(&str, &str)],
    extra: &[RuleSpec],
    kind: RuleKind,
) -> Result<Vec<PolicyRule>> {
    builtin
        .iter()
        .map(|(name, pattern)| PolicyRule::compile(name, pattern, kind))
        .chain(
            extra
                .iter()
                .map(|spec| PolicyRule::compile(&spec.name, &spec.pattern, kind)),
        )
        .collect()
}
