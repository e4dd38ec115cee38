//! A single on-demand quick tunnel

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tm_core::config::ManagerConfig;
use tm_core::error::{Result, TunnelError};
use tm_core::{Target, TunnelState};

use super::scanner::extract_tunnel_url;
use crate::process::{OutputLines, TunnelProcess};

/// Settings shared by every quick tunnel
#[derive(Debug, Clone)]
pub struct QuickTunnelSettings {
    /// Tunnel executable
    pub binary: PathBuf,
    /// Upper bound on waiting for the public URL
    pub readiness_timeout: Duration,
    /// Grace period per termination signal
    pub stop_timeout: Duration,
}

impl QuickTunnelSettings {
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self {
            binary: config.tunnel_bin.clone(),
            readiness_timeout: config.readiness_timeout,
            stop_timeout: config.stop_timeout,
        }
    }
}

#[derive(Debug)]
struct Status {
    state: TunnelState,
    url: Option<String>,
}

/// An ephemeral tunnel exposing one target
pub struct QuickTunnel {
    /// Caller-supplied target string (the registry key)
    key: String,
    target: Target,
    process: TunnelProcess,
    status: RwLock<Status>,
    stop_timeout: Duration,
    /// Cancels the output relay
    cancel: CancellationToken,
    relay: Mutex<Option<JoinHandle<()>>>,
}

impl QuickTunnel {
    /// Spawn the tunnel process and wait until it reports its public URL.
    ///
    /// Fails with `TunnelStartFailed` if the output ends or the readiness
    /// timeout expires first; the process is terminated in that case.
    pub async fn start(
        key: impl Into<String>,
        target: Target,
        settings: &QuickTunnelSettings,
    ) -> Result<Arc<Self>> {
        let key = key.into();
        let args = ["--no-tls-verify", "--url", target.as_url()];
        let (process, mut lines) =
            TunnelProcess::spawn(&settings.binary, args, target.as_url().to_string())?;

        let tunnel = Arc::new(Self {
            key,
            target,
            process,
            status: RwLock::new(Status {
                state: TunnelState::Starting,
                url: None,
            }),
            stop_timeout: settings.stop_timeout,
            cancel: CancellationToken::new(),
            relay: Mutex::new(None),
        });

        tracing::info!(
            target_url = %tunnel.target,
            pid = ?tunnel.process.pid(),
            "Starting quick tunnel"
        );

        let outcome = tokio::time::timeout(
            settings.readiness_timeout,
            scan_for_url(tunnel.process.label(), &mut lines),
        )
        .await;

        let failure = match outcome {
            Ok(Some(url)) => {
                tunnel.set_status(TunnelState::Ready, Some(url.clone()));
                tracing::info!(target_url = %tunnel.target, "Quick tunnel ready at {}", url);
                tunnel.spawn_relay(lines).await;
                return Ok(tunnel);
            }
            Ok(None) => "output closed before a tunnel URL appeared".to_string(),
            Err(_) => format!(
                "no tunnel URL within {:?}",
                settings.readiness_timeout
            ),
        };

        tunnel.set_status(TunnelState::Failed, None);
        tracing::warn!(target_url = %tunnel.target, "Quick tunnel failed: {}", failure);
        drop(lines);
        if let Err(e) = tunnel.process.terminate(settings.stop_timeout).await {
            tracing::error!(
                target_url = %tunnel.target,
                "Failed to clean up tunnel process after failed start: {}",
                e
            );
        }

        Err(TunnelError::TunnelStartFailed {
            target: tunnel.key.clone(),
            reason: failure,
        })
    }

    /// Registry key this tunnel was created for
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Parsed target
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Current lifecycle state
    pub fn state(&self) -> TunnelState {
        self.status
            .read()
            .map(|s| s.state)
            .unwrap_or(TunnelState::Failed)
    }

    /// Public URL once ready
    pub fn url(&self) -> Option<String> {
        self.status.read().ok().and_then(|s| s.url.clone())
    }

    /// Whether the tunnel is ready and usable
    pub fn is_ready(&self) -> bool {
        self.state() == TunnelState::Ready
    }

    /// OS process id of the tunnel executable
    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    /// Non-blocking check whether the process has gone away
    pub async fn has_exited(&self) -> bool {
        self.process.has_exited().await
    }

    /// Stop the relay, terminate the process and wait for it to exit.
    ///
    /// Stopping an already stopped tunnel is a no-op. The tunnel is only
    /// marked stopped once the process is gone, so a failed stop can be retried.
    pub async fn stop(&self) -> Result<()> {
        if self.state() == TunnelState::Stopped {
            return Ok(());
        }

        self.stop_relay().await;
        self.process.terminate(self.stop_timeout).await?;
        self.set_status(TunnelState::Stopped, self.url());
        tracing::info!(target_url = %self.target, "Quick tunnel stopped");
        Ok(())
    }

    /// Release the relay of a tunnel whose process already died.
    ///
    /// Used by the health monitor; no signal is sent to the process.
    pub async fn reap(&self) {
        self.set_status(TunnelState::Stopped, self.url());
        self.stop_relay().await;
    }

    fn set_status(&self, state: TunnelState, url: Option<String>) {
        let mut status = match self.status.write() {
            Ok(status) => status,
            Err(poisoned) => poisoned.into_inner(),
        };
        status.state = state;
        status.url = url;
    }

    async fn spawn_relay(&self, mut lines: OutputLines) {
        let cancel = self.cancel.clone();
        let label = self.process.label().to_string();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    line = lines.next_line() => match line {
                        Some(line) => {
                            tracing::info!(target: "tunnel_output", tunnel = %label, "{}", line);
                        }
                        None => {
                            tracing::debug!(tunnel = %label, "Tunnel output closed");
                            break;
                        }
                    },
                }
            }
        });

        *self.relay.lock().await = Some(handle);
    }

    async fn stop_relay(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.relay.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::warn!(target_url = %self.target, "Output relay ended abnormally: {}", e);
            }
        }
    }
}

impl fmt::Debug for QuickTunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuickTunnel")
            .field("key", &self.key)
            .field("state", &self.state())
            .field("url", &self.url())
            .field("pid", &self.process.pid())
            .finish()
    }
}

/// Read lines until one carries the provider URL; `None` when output ends first
async fn scan_for_url(label: &str, lines: &mut OutputLines) -> Option<String> {
    while let Some(line) = lines.next_line().await {
        tracing::info!(target: "tunnel_output", tunnel = %label, "{}", line);
        if let Some(url) = extract_tunnel_url(&line) {
            return Some(url);
        }
    }
    None
}
