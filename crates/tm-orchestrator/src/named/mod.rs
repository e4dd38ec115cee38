//! Named tunnel support
//!
//! A credential-configured daemon process plus route lookups against the
//! config endpoint it publishes.

mod daemon;
mod resolver;

pub use daemon::NamedTunnelDaemon;
pub use resolver::NamedTunnelResolver;

use tokio::sync::Mutex;

use tm_core::config::ManagerConfig;
use tm_core::error::{Result, TunnelError};
use tm_core::ingress::NamedRoute;

/// Named tunnel state exposed to the control API
pub struct NamedTunnels {
    /// Credential the daemon authenticates with; `None` disables named lookups
    token: Option<String>,
    resolver: NamedTunnelResolver,
    daemon: Mutex<Option<NamedTunnelDaemon>>,
}

impl NamedTunnels {
    pub fn from_config(config: &ManagerConfig) -> Result<Self> {
        Ok(Self {
            token: config.tunnel_token.clone(),
            resolver: NamedTunnelResolver::new(
                config.config_endpoint(),
                config.config_fetch_timeout,
            )?,
            daemon: Mutex::new(None),
        })
    }

    /// Whether a credential is configured
    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Route lookups
    pub fn resolver(&self) -> &NamedTunnelResolver {
        &self.resolver
    }

    /// Spawn the daemon if a credential is configured and it is not already running
    pub async fn start(&self, config: &ManagerConfig) -> Result<()> {
        let Some(token) = self.token.as_deref() else {
            tracing::info!("No tunnel token configured, named tunnels disabled");
            return Ok(());
        };

        let mut daemon = self.daemon.lock().await;
        if daemon.is_none() {
            *daemon = Some(NamedTunnelDaemon::start(
                &config.tunnel_bin,
                token,
                &config.metrics_address,
                config.stop_timeout,
            )?);
        }
        Ok(())
    }

    /// Whether the daemon process is alive
    pub async fn is_running(&self) -> bool {
        match self.daemon.lock().await.as_ref() {
            Some(daemon) => daemon.is_running().await,
            None => false,
        }
    }

    /// Public URL for an internal port
    pub async fn get_named(&self, port: u16) -> Result<String> {
        if !self.is_enabled() {
            return Err(TunnelError::NamedTunnelDisabled);
        }
        Ok(self.resolver.resolve(port).await?.public_url())
    }

    /// Every routable service and its public hostname
    pub async fn list(&self) -> Result<Vec<NamedRoute>> {
        self.resolver.list().await
    }

    /// Stop the daemon; no-op if it was never started
    pub async fn stop(&self) -> Result<()> {
        match self.daemon.lock().await.take() {
            Some(daemon) => daemon.stop().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_without_token() {
        let named = NamedTunnels::from_config(&ManagerConfig::default()).unwrap();
        assert!(!named.is_enabled());
        assert!(matches!(
            named.get_named(8080).await,
            Err(TunnelError::NamedTunnelDisabled)
        ));

        // Starting without a credential spawns nothing
        named.start(&ManagerConfig::default()).await.unwrap();
        assert!(!named.is_running().await);
        named.stop().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_and_stop_daemon() {
        let fake = crate::testing::FakeCloudflared::silent();
        let config = ManagerConfig {
            tunnel_bin: fake.path().to_path_buf(),
            tunnel_token: Some("token".into()),
            ..ManagerConfig::default()
        };

        let named = NamedTunnels::from_config(&config).unwrap();
        named.start(&config).await.unwrap();
        named.start(&config).await.unwrap();
        assert!(named.is_running().await);

        named.stop().await.unwrap();
        assert!(!named.is_running().await);
    }
}
