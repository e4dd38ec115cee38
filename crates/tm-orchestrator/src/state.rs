//! Shared manager state

use std::net::Ipv4Addr;
use std::sync::{Arc, RwLock};

use tm_core::config::ManagerConfig;
use tm_core::error::{Result, TunnelError};
use tm_core::traits::PortMappingSource;

use crate::named::NamedTunnels;
use crate::quick::QuickTunnelSettings;
use crate::registry::TunnelRegistry;

/// Global state for the tunnel manager daemon
pub struct ManagerState {
    /// Configuration
    pub config: ManagerConfig,
    /// Quick tunnels by target string
    pub registry: Arc<TunnelRegistry>,
    /// Named tunnel daemon and route lookups
    pub named: Arc<NamedTunnels>,
    /// Internal to external port lookup
    port_mappings: Arc<dyn PortMappingSource>,
    /// Last public IP reported by the host
    public_ip: RwLock<Option<Ipv4Addr>>,
}

impl ManagerState {
    /// Create state with port mappings taken from the configuration
    pub fn new(config: ManagerConfig) -> Result<Self> {
        let mappings = Arc::new(config.port_mapping_source());
        Self::with_port_mappings(config, mappings)
    }

    /// Create state with an explicit port mapping source
    pub fn with_port_mappings(
        config: ManagerConfig,
        port_mappings: Arc<dyn PortMappingSource>,
    ) -> Result<Self> {
        let registry = Arc::new(TunnelRegistry::new(QuickTunnelSettings::from_config(&config)));
        let named = Arc::new(NamedTunnels::from_config(&config)?);

        Ok(Self {
            config,
            registry,
            named,
            port_mappings,
            public_ip: RwLock::new(None),
        })
    }

    /// Validate and store the public IP
    pub fn set_public_ip(&self, raw: &str) -> Result<Ipv4Addr> {
        let ip: Ipv4Addr = raw
            .trim()
            .parse()
            .map_err(|_| TunnelError::InvalidIpAddress(raw.to_string()))?;

        let mut guard = match self.public_ip.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(ip);
        tracing::info!("Public IP set to {}", ip);
        Ok(ip)
    }

    /// Current public IP, if one was reported
    pub fn public_ip(&self) -> Option<Ipv4Addr> {
        match self.public_ip.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// `{scheme}://{public_ip}:{external_port}` for an internal port
    pub fn direct_url(&self, port: u16) -> Result<String> {
        let ip = self.public_ip().ok_or(TunnelError::PublicIpNotSet)?;
        let external = self
            .port_mappings
            .external_port(port)
            .ok_or_else(|| TunnelError::PortMappingNotFound(self.port_mappings.describe(port)))?;

        Ok(format!(
            "{}://{}:{}",
            self.config.direct_scheme(),
            ip,
            external
        ))
    }
}
