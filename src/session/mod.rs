//! Session management module.
//!
//! A single authenticated SSH connection to the router is shared by all
//! commands. [`SessionManager`] owns it; the wire protocol sits behind the
//! [`Connector`] and [`RemoteShell`] traits with [`SshConnector`] as the
//! production implementation.

mod manager;
mod ssh;
mod state;
mod target;
mod transport;

pub use manager::SessionManager;
pub use ssh::SshConnector;
pub use state::ConnectionState;
pub use target::{Credential, HostKeyPolicy, Target};
pub use transport::{Connector, RemoteOutput, RemoteProcess, RemoteShell};
