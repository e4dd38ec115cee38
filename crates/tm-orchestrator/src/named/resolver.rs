//! Named route lookup against the daemon's config endpoint
//!
//! The routing table is never cached: every lookup fetches the current
//! document so remote changes are visible immediately.

use std::time::Duration;

use tm_core::error::{Result, TunnelError};
use tm_core::ingress::{IngressDocument, NamedRoute};

/// Fetches and queries the ingress document
#[derive(Debug, Clone)]
pub struct NamedTunnelResolver {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl NamedTunnelResolver {
    /// Resolver for `endpoint` with a per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TunnelError::Io(std::io::Error::other(e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    /// Config endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Public route for an internal port
    pub async fn resolve(&self, port: u16) -> Result<NamedRoute> {
        let document = self.fetch().await?;
        document
            .route_for_port(port)
            .ok_or(TunnelError::NamedRouteNotFound(port))
    }

    /// Every routable service currently configured
    pub async fn list(&self) -> Result<Vec<NamedRoute>> {
        Ok(self.fetch().await?.routes())
    }

    async fn fetch(&self) -> Result<IngressDocument> {
        tracing::debug!("Fetching tunnel config from {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Tunnel config endpoint returned {}", status);
            return Err(TunnelError::ConfigUnavailable {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| self.request_error(e))?;
        IngressDocument::from_json(&body)
    }

    fn request_error(&self, e: reqwest::Error) -> TunnelError {
        if e.is_timeout() {
            tracing::warn!("Timed out fetching tunnel config from {}", self.endpoint);
            TunnelError::ConfigFetchTimeout {
                endpoint: self.endpoint.clone(),
                timeout: self.timeout,
            }
        } else {
            tracing::warn!("Failed to fetch tunnel config from {}: {}", self.endpoint, e);
            TunnelError::ConfigFetchConnectionError {
                endpoint: self.endpoint.clone(),
            }
        }
    }
}
