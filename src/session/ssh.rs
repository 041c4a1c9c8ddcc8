//! SSH transport over `russh`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key;

use super::transport::{Connector, RemoteOutput, RemoteProcess, RemoteShell};
use super::{Credential, HostKeyPolicy, Target};
use crate::error::GatewayError;
use crate::Result;

/// Extended data stream number for stderr.
const STDERR_STREAM: u32 = 1;

/// How long `close` waits for the session task to wind down.
const TEARDOWN_WAIT: Duration = Duration::from_secs(2);

/// Upper bound on sending CHANNEL_CLOSE for an abandoned command.
const ABORT_WAIT: Duration = Duration::from_millis(500);

struct ClientHandler {
    host: String,
    policy: HostKeyPolicy,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        let accepted = self.policy.accepts(&fingerprint);
        if accepted {
            tracing::debug!(host = %self.host, %fingerprint, "host key accepted");
        } else {
            tracing::error!(host = %self.host, %fingerprint, "host key rejected: fingerprint mismatch");
        }
        Ok(accepted)
    }
}

/// Opens authenticated `russh` sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

impl SshConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, target: &Target) -> Result<Arc<dyn RemoteShell>> {
        let config = Arc::new(client::Config {
            keepalive_interval: Some(target.keepalive_interval),
            ..Default::default()
        });
        let handler = ClientHandler {
            host: target.host.clone(),
            policy: target.host_key_policy.clone(),
        };

        let connecting = client::connect(config, (target.host.as_str(), target.port), handler);
        let mut handle = tokio::time::timeout(target.connect_timeout, connecting)
            .await
            .map_err(|_| {
                GatewayError::Connection(format!(
                    "connect to {} timed out after {}s",
                    target.endpoint(),
                    target.connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| GatewayError::Connection(e.to_string()))?;

        let authenticated = match &target.credential {
            Credential::KeyFile(path) => {
                tracing::info!(key = %path.display(), "using SSH key authentication");
                let key_pair = russh_keys::load_secret_key(path, None).map_err(|e| {
                    GatewayError::Connection(format!(
                        "failed to load key {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                handle
                    .authenticate_publickey(target.user.as_str(), Arc::new(key_pair))
                    .await?
            }
            Credential::Password(password) => {
                tracing::info!("using password authentication");
                handle
                    .authenticate_password(target.user.as_str(), password.as_str())
                    .await?
            }
        };

        if !authenticated {
            return Err(GatewayError::Connection(format!(
                "authentication failed for {}",
                target.endpoint()
            )));
        }

        Ok(Arc::new(SshShell {
            handle: tokio::sync::Mutex::new(handle),
            closed: AtomicBool::new(false),
        }))
    }
}

/// One authenticated connection. Every command gets its own channel.
struct SshShell {
    // Locked only while opening a channel; commands then run in parallel.
    handle: tokio::sync::Mutex<Handle<ClientHandler>>,
    closed: AtomicBool,
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn spawn(&self, command: &str) -> Result<Box<dyn RemoteProcess>> {
        let channel = {
            let handle = self.handle.lock().await;
            if handle.is_closed() {
                self.closed.store(true, Ordering::Release);
                return Err(GatewayError::Connection("SSH connection closed".into()));
            }
            handle.channel_open_session().await?
        };
        let mut process = SshProcess { channel };
        if let Err(err) = process.channel.exec(true, command).await {
            process.abort().await;
            return Err(err.into());
        }
        Ok(Box::new(process))
    }

    fn is_closed(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return true;
        }
        // Busy means a channel is being opened, so the connection is in use.
        match self.handle.try_lock() {
            Ok(handle) => handle.is_closed(),
            Err(_) => false,
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        let handle = self.handle.lock().await;
        if handle.is_closed() {
            return Ok(());
        }
        handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;

        let teardown = async {
            while !handle.is_closed() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        };
        if tokio::time::timeout(TEARDOWN_WAIT, teardown).await.is_err() {
            tracing::debug!("SSH session still draining after disconnect");
        }
        Ok(())
    }
}

/// A command running on its own session channel.
struct SshProcess {
    channel: Channel<client::Msg>,
}

#[async_trait]
impl RemoteProcess for SshProcess {
    async fn wait(&mut self) -> Result<RemoteOutput> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        while let Some(msg) = self.channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == STDERR_STREAM => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                _ => {}
            }
        }

        Ok(RemoteOutput {
            stdout: String::from_utf8_lossy(&stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            exit_status,
        })
    }

    async fn abort(&mut self) {
        // Dropping a russh channel sends nothing; the router would keep it open.
        match tokio::time::timeout(ABORT_WAIT, self.channel.close()).await {
            Ok(Ok(())) => {
                tracing::debug!(channel = ?self.channel.id(), "channel closed after abort")
            }
            Ok(Err(e)) => tracing::debug!(error = %e, "channel close failed"),
            Err(_) => tracing::debug!("channel close timed out"),
        }
    }
}
