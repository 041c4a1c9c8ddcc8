//! Ownership of the single shared router connection.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::transport::{Connector, RemoteShell};
use super::{ConnectionState, Target};
use crate::audit::{AuditLog, AuditRecord};
use crate::error::GatewayError;
use crate::Result;

struct Slot {
    state: ConnectionState,
    shell: Option<Arc<dyn RemoteShell>>,
}

impl Slot {
    fn set_state(&mut self, target: ConnectionState) {
        if let Err(err) = self.state.transition_to(target) {
            tracing::warn!(%err, "forcing connection state");
            self.state = target;
        }
    }
}

/// Owns the one live remote shell and serializes connection establishment.
///
/// Commands read the current shell without waiting on each other; only
/// connect and disconnect go through the critical section.
pub struct SessionManager {
    target: Target,
    connector: Arc<dyn Connector>,
    audit: Arc<AuditLog>,
    gate: Mutex<()>,
    slot: RwLock<Slot>,
}

impl SessionManager {
    pub fn new(target: Target, connector: Arc<dyn Connector>, audit: Arc<AuditLog>) -> Self {
        Self {
            target,
            connector,
            audit,
            gate: Mutex::new(()),
            slot: RwLock::new(Slot {
                state: ConnectionState::Disconnected,
                shell: None,
            }),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn state(&self) -> ConnectionState {
        self.slot.read().state
    }

    /// Cached connection flag. May be stale; see [`current`](Self::current).
    pub fn is_connected(&self) -> bool {
        self.state().can_execute()
    }

    /// Open a fresh connection, replacing any existing one.
    ///
    /// Returns `false` on failure; the failure is logged and audited.
    pub async fn connect(&self) -> bool {
        let _guard = self.gate.lock().await;
        self.connect_locked().await.is_ok()
    }

    /// Connect unless a live connection already exists.
    ///
    /// Concurrent callers wait for a single in-flight attempt and then
    /// observe its result.
    pub async fn ensure_connected(&self) -> Result<()> {
        let _guard = self.gate.lock().await;
        if self.current().is_some() {
            return Ok(());
        }
        tracing::info!("connection not active, attempting to reconnect");
        self.connect_locked().await
    }

    /// Close the connection and wait for teardown. No-op when disconnected.
    pub async fn disconnect(&self) {
        let _guard = self.gate.lock().await;
        let Some(shell) = self.take_shell() else {
            return;
        };

        match shell.close().await {
            Ok(()) => {
                tracing::info!("SSH connection closed");
                self.audit
                    .record(AuditRecord::disconnect("Connection closed gracefully"));
            }
            Err(err) => {
                tracing::warn!(%err, "SSH connection closed with error");
                self.audit.record(AuditRecord::connection_error(&format!(
                    "disconnect failed: {}",
                    err
                )));
            }
        }
    }

    /// The live shell, if any.
    ///
    /// A shell whose connection has dropped is discarded here and the state
    /// falls back to `Disconnected`.
    pub fn current(&self) -> Option<Arc<dyn RemoteShell>> {
        {
            let slot = self.slot.read();
            match &slot.shell {
                Some(shell) if !shell.is_closed() => return Some(Arc::clone(shell)),
                Some(_) => {}
                None => return None,
            }
        }

        let mut slot = self.slot.write();
        if slot.shell.as_ref().is_some_and(|shell| shell.is_closed()) {
            slot.shell = None;
            slot.set_state(ConnectionState::Disconnected);
            drop(slot);
            tracing::warn!(endpoint = %self.target.endpoint(), "SSH connection lost");
            self.audit.record(AuditRecord::disconnect("Connection lost"));
            return None;
        }
        slot.shell.clone()
    }

    async fn connect_locked(&self) -> Result<()> {
        if let Some(previous) = self.take_shell() {
            if let Err(err) = previous.close().await {
                tracing::debug!(%err, "closing replaced connection failed");
            }
            self.audit
                .record(AuditRecord::disconnect("Connection replaced by reconnect"));
        }

        let endpoint = self.target.endpoint();
        self.slot.write().set_state(ConnectionState::Connecting);
        tracing::info!(%endpoint, "connecting");

        match self.connector.connect(&self.target).await {
            Ok(shell) => {
                {
                    let mut slot = self.slot.write();
                    slot.shell = Some(shell);
                    slot.set_state(ConnectionState::Connected);
                }
                tracing::info!(%endpoint, "SSH connection established");
                self.audit.record(AuditRecord::connect(&endpoint));
                Ok(())
            }
            Err(err) => {
                self.slot.write().set_state(ConnectionState::Failed);
                tracing::error!(%endpoint, %err, "SSH connection failed");
                self.audit.record(AuditRecord::connection_error(&err.to_string()));
                Err(match err {
                    GatewayError::Connection(_) => err,
                    other => GatewayError::Connection(other.to_string()),
                })
            }
        }
    }

    fn take_shell(&self) -> Option<Arc<dyn RemoteShell>> {
        let mut slot = self.slot.write();
        let shell = slot.shell.take()?;
        slot.set_state(ConnectionState::Disconnected);
        Some(shell)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("endpoint", &self.target.endpoint())
            .field("state", &self.state())
            .finish()
    }
}
