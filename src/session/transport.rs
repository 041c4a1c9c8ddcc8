//! Transport seam between the session manager and the wire.

use std::sync::Arc;

use async_trait::async_trait;

use super::Target;
use crate::Result;

/// Raw result of one remote invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status reported by the remote side, if any.
    pub exit_status: Option<u32>,
}

/// One command started on the remote side.
///
/// Dropping a process does not stop it; callers that give up on it must
/// call [`abort`](Self::abort) so the remote end releases its channel.
#[async_trait]
pub trait RemoteProcess: Send {
    /// Wait for the command to finish. A non-zero exit status is not an error.
    async fn wait(&mut self) -> Result<RemoteOutput>;

    /// Best-effort close of this command's channel. The connection stays up.
    async fn abort(&mut self);
}

/// A live, authenticated remote shell that can run many commands.
///
/// Implementations must allow concurrent `spawn` calls.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Start one command on its own channel.
    async fn spawn(&self, command: &str) -> Result<Box<dyn RemoteProcess>>;

    /// Run one command to completion.
    async fn exec(&self, command: &str) -> Result<RemoteOutput> {
        self.spawn(command).await?.wait().await
    }

    /// Whether the underlying connection is known to be gone.
    fn is_closed(&self) -> bool;

    /// Close the connection and wait for teardown.
    async fn close(&self) -> Result<()>;
}

/// Opens remote shells.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &Target) -> Result<Arc<dyn RemoteShell>>;
}
