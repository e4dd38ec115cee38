//! Quick tunnel health monitoring
//!
//! Tunnel processes can die outside our control (killed by a user, OOM, a
//! provider-side disconnect). The monitor periodically polls every registered
//! tunnel and evicts those whose process has exited so the next request for
//! that target starts a fresh one. Evicted tunnels only have their relay task
//! reaped; no signal is sent since the process is already gone.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::registry::TunnelRegistry;

/// Periodic sweep of the tunnel registry
pub struct HealthMonitor {
    registry: Arc<TunnelRegistry>,
    /// Sweep interval
    interval: Duration,
}

impl HealthMonitor {
    /// Create a new health monitor
    pub fn new(registry: Arc<TunnelRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Run the sweep loop until `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!("Starting tunnel health monitor (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Tunnel health monitor shutting down");
                    break;
                }
            }
        }
    }

    /// Evict every tunnel whose process has exited; returns the evicted keys
    pub async fn sweep(&self) -> Vec<String> {
        let mut evicted = Vec::new();

        for (key, tunnel) in self.registry.entries() {
            if !tunnel.has_exited().await {
                continue;
            }
            // A concurrent stop/refresh may already have replaced the entry
            if self.registry.evict(&key, &tunnel) {
                tracing::warn!(
                    "Process for {} (pid {:?}) has died, removing from registry",
                    key,
                    tunnel.pid()
                );
                tunnel.reap().await;
                evicted.push(key);
            }
        }

        if !evicted.is_empty() {
            tracing::info!("Evicted {} dead quick tunnels", evicted.len());
        }
        evicted
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tm_core::TunnelState;

    use crate::quick::QuickTunnelSettings;
    use crate::testing::FakeCloudflared;

    fn registry(fake: &FakeCloudflared) -> Arc<TunnelRegistry> {
        Arc::new(TunnelRegistry::new(QuickTunnelSettings {
            binary: fake.path().to_path_buf(),
            readiness_timeout: Duration::from_secs(10),
            stop_timeout: Duration::from_secs(5),
        }))
    }

    fn kill_externally(pid: u32) {
        let status = std::process::Command::new("kill")
            .args(["-9", &pid.to_string()])
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_tunnels() {
        let fake = FakeCloudflared::numbered();
        let registry = registry(&fake);
        registry.get_or_create("localhost:7001").await.unwrap();

        let monitor = HealthMonitor::new(Arc::clone(&registry), Duration::from_secs(10));
        assert!(monitor.sweep().await.is_empty());
        assert_eq!(registry.len(), 1);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweep_evicts_externally_killed_tunnel() {
        let fake = FakeCloudflared::numbered();
        let registry = registry(&fake);
        let tunnel = registry.get_or_create("localhost:7002").await.unwrap();
        let survivor = registry.get_or_create("localhost:7003").await.unwrap();

        kill_externally(tunnel.pid().unwrap());

        let monitor = HealthMonitor::new(Arc::clone(&registry), Duration::from_secs(10));
        let mut evicted = Vec::new();
        for _ in 0..100 {
            evicted = monitor.sweep().await;
            if !evicted.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(evicted, vec!["localhost:7002".to_string()]);
        assert_eq!(tunnel.state(), TunnelState::Stopped);
        assert!(registry.get_existing("localhost:7002").is_err());
        assert!(registry.get_existing("localhost:7003").is_ok());
        assert!(survivor.is_ready());

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_monitor_loop_stops_on_cancel() {
        let fake = FakeCloudflared::numbered();
        let registry = registry(&fake);
        let cancel = CancellationToken::new();

        let handle = HealthMonitor::new(registry, Duration::from_millis(50)).spawn(cancel.clone());
        tokio::time::sleep(Duration::from_millis(120)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
