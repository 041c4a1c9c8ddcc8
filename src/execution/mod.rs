//! Command execution engine.
//!
//! This module runs one command over the shared session under a deadline
//! and normalizes every outcome:
//! - remote exit status (zero or not) is reported as-is
//! - deadline elapsed, transport failure and missing session become
//!   synthetic results with exit code [`NO_EXIT_CODE`]

mod command;
mod engine;
mod result;

pub use command::CommandRequest;
pub use engine::{ExecutionEngine, DEFAULT_TIMEOUT};
pub use result::{ExecutionResult, ResultKind, NO_EXIT_CODE};
