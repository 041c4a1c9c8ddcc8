//! # openwrt-gate
//!
//! Policy-enforcing command gateway for OpenWrt routers.
//!
//! Every command string is validated against deny and allow tables before it
//! is sent over a single shared SSH session. Each attempt, allowed or not,
//! leaves one line in an append-only audit trail.
//!
//! ## Features
//!
//! - **Policy**: deny rules dominate; allow rules must match the whole command
//! - **Single session**: one connection, established lazily and reused
//! - **Deadlines**: a per-command timeout never tears down the session
//! - **Audit trail**: line-atomic, safe under concurrent commands
//! - **Operations**: named router tasks composed from whitelisted commands
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use openwrt_gate::{Config, Gateway, SshConnector};
//!
//! #[tokio::main]
//! async fn main() -> openwrt_gate::Result<()> {
//!     openwrt_gate::logging::try_init().ok();
//!
//!     let mut config = Config::default();
//!     config.target.password = Some("secret".into());
//!
//!     let gateway = Gateway::from_config(&config, Arc::new(SshConnector))?;
//!     let outcome = gateway.execute("ubus call system board").await;
//!     println!("{:?}", outcome.to_response());
//!
//!     gateway.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod gateway;
pub mod logging;
pub mod ops;
pub mod policy;
pub mod session;

// Re-export commonly used types
pub use audit::{AuditLog, AuditRecord};
pub use config::{Config, ConfigError};
pub use error::{GatewayError, Result};
pub use execution::{CommandRequest, ExecutionEngine, ExecutionResult};
pub use gateway::{CommandResponse, ConnectionTest, Gateway, GatewayStatus, Outcome};
pub use ops::{Operation, OperationReport, OperationRunner};
pub use policy::{PolicyEngine, ValidationVerdict};
pub use session::{ConnectionState, SessionManager, SshConnector, Target};
