//! Named router operations.
//!
//! A fixed catalog of higher-level tasks (system info, DHCP leases, Thread
//! network setup, package management) built from whitelisted commands. Each
//! operation checks its arguments first, then runs its commands one by one
//! through the [`Gateway`](crate::Gateway).

pub mod catalog;
pub mod parse;
pub mod runner;

pub use catalog::{find, Operation, OperationError, OperationInfo, OPERATIONS};
pub use runner::{OperationReport, OperationRunner};
