//! Named-tunnel ingress document
//!
//! The named-tunnel daemon publishes its remotely managed routing table on a
//! local `/config` endpoint as `{"config": {"ingress": [{"service", "hostname"}]}}`.
//! Only HTTP services with a public hostname are routable; catch-all rules such
//! as `http_status:404` carry no hostname and are skipped.

use serde::{Deserialize, Serialize};

use crate::error::TunnelError;

/// Top-level document served by the config endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngressDocument {
    #[serde(default)]
    pub config: IngressConfig,
}

/// The `config` object of the document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngressConfig {
    #[serde(default)]
    pub ingress: Vec<IngressRule>,
}

/// A single ingress rule
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngressRule {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

/// A resolved public route for an internal HTTP service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRoute {
    /// Internal service URL, e.g. `http://localhost:8080`
    pub service: String,
    /// Public hostname assigned by the control plane
    pub hostname: String,
}

impl NamedRoute {
    /// Public URL for the route
    pub fn public_url(&self) -> String {
        format!("https://{}", self.hostname)
    }
}

impl IngressDocument {
    /// Parse the raw response body
    pub fn from_json(body: &str) -> Result<Self, TunnelError> {
        serde_json::from_str(body).map_err(|e| TunnelError::ConfigParseError(e.to_string()))
    }

    /// Every HTTP service that has a public hostname, in document order
    pub fn routes(&self) -> Vec<NamedRoute> {
        self.config
            .ingress
            .iter()
            .filter_map(|rule| {
                let service = rule.service.as_deref().filter(|s| is_http_service(s))?;
                let hostname = rule.hostname.as_deref().filter(|h| !h.is_empty())?;
                Some(NamedRoute {
                    service: service.to_string(),
                    hostname: hostname.to_string(),
                })
            })
            .collect()
    }

    /// First route whose service ends in exactly `:{port}`
    pub fn route_for_port(&self, port: u16) -> Option<NamedRoute> {
        let suffix = format!(":{}", port);
        self.routes()
            .into_iter()
            .find(|route| route.service.ends_with(&suffix))
    }
}

fn is_http_service(service: &str) -> bool {
    service.starts_with("http://") || service.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "config": {
            "ingress": [
                {"service": "http://localhost:18080", "hostname": "wide.example.com"},
                {"service": "http://localhost:8080x", "hostname": "junk.example.com"},
                {"service": "http://localhost:8080", "hostname": "app.example.com"},
                {"service": "https://localhost:1111", "hostname": "portal.example.com"},
                {"service": "http://localhost:7860"},
                {"service": "tcp://localhost:22", "hostname": "ssh.example.com"},
                {"service": "http_status:404"}
            ]
        }
    }"#;

    #[test]
    fn test_route_for_port_exact_suffix() {
        let doc = IngressDocument::from_json(SAMPLE).unwrap();
        let route = doc.route_for_port(8080).unwrap();
        assert_eq!(route.hostname, "app.example.com");
        assert_eq!(route.public_url(), "https://app.example.com");
    }

    #[test]
    fn test_route_for_port_does_not_match_longer_port() {
        let doc = IngressDocument::from_json(
            r#"{"config":{"ingress":[{"service":"http://localhost:1180","hostname":"a.example.com"}]}}"#,
        )
        .unwrap();
        assert!(doc.route_for_port(80).is_none());
        assert!(doc.route_for_port(1180).is_some());
    }

    #[test]
    fn test_route_requires_hostname_and_http() {
        let doc = IngressDocument::from_json(SAMPLE).unwrap();
        assert!(doc.route_for_port(7860).is_none());
        assert!(doc.route_for_port(22).is_none());
    }

    #[test]
    fn test_routes_lists_http_with_hostname() {
        let doc = IngressDocument::from_json(SAMPLE).unwrap();
        let hosts: Vec<_> = doc.routes().into_iter().map(|r| r.hostname).collect();
        assert_eq!(
            hosts,
            vec![
                "wide.example.com",
                "junk.example.com",
                "app.example.com",
                "portal.example.com"
            ]
        );
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let doc = IngressDocument::from_json("{}").unwrap();
        assert!(doc.routes().is_empty());

        let doc = IngressDocument::from_json(r#"{"config":{}}"#).unwrap();
        assert!(doc.route_for_port(8080).is_none());
    }

    #[test]
    fn test_malformed_body() {
        let err = IngressDocument::from_json("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, TunnelError::ConfigParseError(_)));
    }
}
