//! Long-running authenticated named-tunnel process
//!
//! `cloudflared tunnel --metrics <addr> run --token <token>` connects to the
//! remote control plane, which owns the routing table. The process serves that
//! table on its local metrics endpoint; we only relay its output and keep it
//! alive until shutdown.

use std::path::Path;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tm_core::error::Result;

use crate::process::TunnelProcess;

const LABEL: &str = "named-tunnel";

/// The single named-tunnel daemon of this process
pub struct NamedTunnelDaemon {
    process: TunnelProcess,
    cancel: CancellationToken,
    relay: JoinHandle<()>,
    stop_timeout: Duration,
}

impl NamedTunnelDaemon {
    /// Spawn the daemon
    pub fn start(
        binary: &Path,
        token: &str,
        metrics_address: &str,
        stop_timeout: Duration,
    ) -> Result<Self> {
        let args = ["tunnel", "--metrics", metrics_address, "run", "--token", token];
        let (process, mut lines) = TunnelProcess::spawn(binary, args, LABEL)?;

        let cancel = CancellationToken::new();
        let relay_cancel = cancel.clone();
        let relay = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = relay_cancel.cancelled() => break,
                    line = lines.next_line() => match line {
                        Some(line) => tracing::info!(target: "tunnel_output", tunnel = LABEL, "{}", line),
                        None => {
                            tracing::warn!("Named tunnel output closed");
                            break;
                        }
                    },
                }
            }
        });

        tracing::info!(
            pid = ?process.pid(),
            metrics = %metrics_address,
            "Named tunnel process started"
        );

        Ok(Self {
            process,
            cancel,
            relay,
            stop_timeout,
        })
    }

    /// OS process id
    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    /// Whether the daemon process is still running
    pub async fn is_running(&self) -> bool {
        !self.process.has_exited().await
    }

    /// Stop the relay, terminate the process and wait for it to exit
    pub async fn stop(self) -> Result<()> {
        self.cancel.cancel();
        if let Err(e) = self.relay.await {
            tracing::warn!("Named tunnel relay ended abnormally: {}", e);
        }
        self.process.terminate(self.stop_timeout).await?;
        tracing::info!("Named tunnel process terminated");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing::FakeCloudflared;

    #[tokio::test]
    async fn test_daemon_command_line_and_stop() {
        let fake = FakeCloudflared::silent();
        let daemon = NamedTunnelDaemon::start(
            fake.path(),
            "secret-token",
            "localhost:11113",
            Duration::from_secs(5),
        )
        .unwrap();

        assert!(daemon.is_running().await);

        // The script logs its arguments before going quiet
        for _ in 0..100 {
            if !fake.invocations().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(
            fake.invocations(),
            vec!["tunnel --metrics localhost:11113 run --token secret-token"]
        );

        daemon.stop().await.unwrap();
    }
}
