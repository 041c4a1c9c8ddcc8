//! Security audit trail.
//!
//! One line per event, appended to a dedicated file:
//!
//! ```text
//! 2025-01-01 12:00:00 | INFO | COMMAND: uptime | STATUS: SUCCESS | TIME: 0.12s | OUTPUT: ...
//! 2025-01-01 12:00:00 | INFO | SSH CONNECT | root@192.168.1.1:22
//! ```

mod log;
mod record;

pub use log::AuditLog;
pub use record::{excerpt, AuditKind, AuditLevel, AuditRecord, OUTPUT_EXCERPT_LIMIT};
