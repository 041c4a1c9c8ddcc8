//! Command policy.
//!
//! Every command string passes through [`PolicyEngine::validate`] before it
//! can reach the router. Evaluation order:
//!
//! 1. validation disabled: allowed, flagged as a bypass
//! 2. deny rules (unanchored, case-insensitive): first match rejects
//! 3. allow rules (anchored to the whole command): first match permits
//! 4. otherwise rejected as `not in whitelist`
//!
//! ## Example
//!
//! ```rust
//! use openwrt_gate::policy::PolicyEngine;
//!
//! let engine = PolicyEngine::new(true).unwrap();
//! assert!(engine.validate("ubus call system board").allowed);
//! assert!(!engine.validate("ubus call system board; rm -rf /").allowed);
//! ```

mod engine;
mod rules;

pub use engine::{PolicyEngine, ValidationVerdict, NOT_WHITELISTED};
pub use rules::{PolicyRule, RuleKind, RuleSpec, ALLOW_RULES, DENY_RULES};
