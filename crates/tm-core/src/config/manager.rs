//! Tunnel manager configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;
use crate::traits::{EnvPortMappings, LayeredPortMappings, PortMappingSource, StaticPortMappings};

/// Environment variable holding the named-tunnel credential
pub const ENV_TUNNEL_TOKEN: &str = "CF_TUNNEL_TOKEN";
/// Environment variable holding the named-tunnel metrics/config address
pub const ENV_METRICS_ADDRESS: &str = "CLOUDFLARE_METRICS";
/// Environment variable toggling https for direct URLs
pub const ENV_ENABLE_HTTPS: &str = "ENABLE_HTTPS";
/// Environment variable holding the access token for the default tunnel
pub const ENV_ACCESS_TOKEN: &str = "OPEN_BUTTON_TOKEN";
/// Environment variable overriding the tunnel executable
pub const ENV_TUNNEL_BIN: &str = "CLOUDFLARED_BIN";
/// Environment variable overriding the control API bind address
pub const ENV_BIND_ADDRESS: &str = "TUNNEL_MANAGER_BIND";

/// Configuration for the tunnel manager daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Address the control API listens on
    pub bind_address: String,

    /// Path to the `cloudflared` executable
    pub tunnel_bin: PathBuf,

    /// Address (`host:port`) where the named-tunnel daemon serves metrics and `/config`
    pub metrics_address: String,

    /// Named-tunnel credential; named tunnels are disabled without it
    pub tunnel_token: Option<String>,

    /// Use `https://` for direct URLs
    pub enable_https: bool,

    /// Prefix of the environment variables advertising external port mappings
    pub port_mapping_prefix: String,

    /// Fixed internal → external port mappings, consulted before the environment
    pub port_mappings: BTreeMap<String, u16>,

    /// Shared secret appended to the default tunnel URL when it is logged
    pub access_token: Option<String>,

    /// Target tunneled at startup (`None` disables it)
    pub default_target: Option<String>,

    /// How long a quick tunnel may take to report its public URL
    #[serde(with = "duration_secs")]
    pub readiness_timeout: Duration,

    /// How long to wait for a tunnel process to exit after each signal
    #[serde(with = "duration_secs")]
    pub stop_timeout: Duration,

    /// Interval between health sweeps of the registry
    #[serde(with = "duration_secs")]
    pub health_interval: Duration,

    /// Request timeout for the named-tunnel config endpoint
    #[serde(with = "duration_secs")]
    pub config_fetch_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:11112".to_string(),
            tunnel_bin: PathBuf::from("/opt/portal-aio/tunnel_manager/cloudflared"),
            metrics_address: "localhost:11113".to_string(),
            tunnel_token: None,
            enable_https: true,
            port_mapping_prefix: "VAST_TCP_PORT_".to_string(),
            port_mappings: BTreeMap::new(),
            access_token: None,
            default_target: Some("https://localhost:1111".to_string()),
            readiness_timeout: Duration::from_secs(60),
            stop_timeout: Duration::from_secs(10),
            health_interval: Duration::from_secs(10),
            config_fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl ManagerConfig {
    /// Apply overrides from the process environment
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty(ENV_TUNNEL_TOKEN) {
            self.tunnel_token = Some(token);
        }
        if let Some(address) = non_empty(ENV_METRICS_ADDRESS) {
            self.metrics_address = address;
        }
        if let Some(flag) = non_empty(ENV_ENABLE_HTTPS) {
            // Anything other than an explicit "false" keeps https on
            self.enable_https = !flag.trim().eq_ignore_ascii_case("false");
        }
        if let Some(token) = non_empty(ENV_ACCESS_TOKEN) {
            self.access_token = Some(token);
        }
        if let Some(bin) = non_empty(ENV_TUNNEL_BIN) {
            self.tunnel_bin = PathBuf::from(bin);
        }
        if let Some(bind) = non_empty(ENV_BIND_ADDRESS) {
            self.bind_address = bind;
        }
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.readiness_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "readiness_timeout must be greater than zero".to_string(),
            ));
        }
        if self.stop_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "stop_timeout must be greater than zero".to_string(),
            ));
        }
        if self.health_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "health_interval must be greater than zero".to_string(),
            ));
        }
        for key in self.port_mappings.keys() {
            key.parse::<u16>().map_err(|_| {
                ConfigError::Invalid(format!("port_mappings key '{}' is not a port", key))
            })?;
        }
        Ok(())
    }

    /// Whether a named-tunnel credential is configured
    pub fn named_tunnel_enabled(&self) -> bool {
        self.tunnel_token.is_some()
    }

    /// URL of the named-tunnel config endpoint
    pub fn config_endpoint(&self) -> String {
        format!("http://{}/config", self.metrics_address)
    }

    /// Scheme used for direct URLs
    pub fn direct_scheme(&self) -> &'static str {
        if self.enable_https {
            "https"
        } else {
            "http"
        }
    }

    /// Port mapping lookup: configured overrides first, then the environment
    pub fn port_mapping_source(&self) -> impl PortMappingSource {
        let overrides = self
            .port_mappings
            .iter()
            .filter_map(|(k, v)| k.parse::<u16>().ok().map(|k| (k, *v)))
            .collect();
        LayeredPortMappings::new(
            StaticPortMappings::new(overrides),
            EnvPortMappings::new(self.port_mapping_prefix.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert!(!config.named_tunnel_enabled());
        assert_eq!(config.config_endpoint(), "http://localhost:11113/config");
        assert_eq!(config.direct_scheme(), "https");
        assert_eq!(config.health_interval, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ManagerConfig::default();
        config.apply_env(lookup(&[
            (ENV_TUNNEL_TOKEN, "secret-token"),
            (ENV_METRICS_ADDRESS, "127.0.0.1:20241"),
            (ENV_ENABLE_HTTPS, "FALSE"),
            (ENV_ACCESS_TOKEN, "open-sesame"),
        ]));

        assert_eq!(config.tunnel_token.as_deref(), Some("secret-token"));
        assert_eq!(config.config_endpoint(), "http://127.0.0.1:20241/config");
        assert_eq!(config.direct_scheme(), "http");
        assert_eq!(config.access_token.as_deref(), Some("open-sesame"));
    }

    #[test]
    fn test_empty_token_keeps_named_tunnels_disabled() {
        let mut config = ManagerConfig::default();
        config.apply_env(lookup(&[(ENV_TUNNEL_TOKEN, "")]));
        assert!(!config.named_tunnel_enabled());
    }

    #[test]
    fn test_https_stays_on_unless_false() {
        let mut config = ManagerConfig::default();
        config.apply_env(lookup(&[(ENV_ENABLE_HTTPS, "no")]));
        assert!(config.enable_https);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ManagerConfig {
            readiness_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_mapping_key() {
        let mut config = ManagerConfig::default();
        config.port_mappings.insert("http".to_string(), 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_port_mapping_source_uses_overrides() {
        let mut config = ManagerConfig {
            port_mapping_prefix: "TM_CONFIG_TEST_PORT_".to_string(),
            ..Default::default()
        };
        config.port_mappings.insert("1111".to_string(), 40001);
        let source = config.port_mapping_source();
        assert_eq!(source.external_port(1111).as_deref(), Some("40001"));
        assert_eq!(source.external_port(2222), None);
    }
}
