//! Tunnel manager lifecycle
//!
//! Owns the background tasks (health monitor, default tunnel) and tears
//! everything down in order on shutdown: background tasks first, then every
//! quick tunnel concurrently, then the named-tunnel daemon.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::health::HealthMonitor;
use crate::state::ManagerState;

/// Supervises the manager's background tasks
pub struct TunnelManager {
    state: Arc<ManagerState>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TunnelManager {
    pub fn new(state: Arc<ManagerState>) -> Self {
        Self {
            state,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Shared state
    pub fn state(&self) -> &Arc<ManagerState> {
        &self.state
    }

    /// Start the named-tunnel daemon, the health monitor and the default tunnel
    pub async fn start(&self) {
        if let Err(e) = self.state.named.start(&self.state.config).await {
            tracing::error!("Failed to start named tunnel: {}", e);
        }

        let mut tasks = self.tasks.lock().await;

        let monitor = HealthMonitor::new(
            Arc::clone(&self.state.registry),
            self.state.config.health_interval,
        );
        tasks.push(monitor.spawn(self.cancel.clone()));

        if let Some(target) = self.state.config.default_target.clone() {
            tasks.push(self.spawn_default_tunnel(target));
        }
    }

    fn spawn_default_tunnel(&self, target: String) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Default tunnel startup cancelled");
                }
                result = state.registry.get_or_create(&target) => match result {
                    Ok(tunnel) => {
                        let url = tunnel.url().unwrap_or_default();
                        match state.config.access_token.as_deref() {
                            Some(token) => {
                                tracing::info!("Default tunnel for {}: {}?token={}", target, url, token)
                            }
                            None => tracing::info!("Default tunnel for {}: {}", target, url),
                        }
                    }
                    Err(e) => tracing::error!("Failed to create default tunnel for {}: {}", target, e),
                },
            }
        })
    }

    /// Stop background tasks, every quick tunnel and the named-tunnel daemon.
    ///
    /// Individual failures are logged; every process still gets a termination attempt.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down tunnel manager");
        self.cancel.cancel();

        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("Background task ended abnormally: {}", e);
            }
        }

        let failures = self.state.registry.shutdown().await;
        for (key, e) in &failures {
            tracing::error!("Failed to stop quick tunnel for {}: {}", key, e);
        }

        if let Err(e) = self.state.named.stop().await {
            tracing::error!("Failed to stop named tunnel: {}", e);
        }

        tracing::info!(
            "Tunnel manager shutdown complete ({} failures)",
            failures.len()
        );
    }
}
