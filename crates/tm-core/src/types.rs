//! Core domain types

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::TunnelError;

/// The internal service a tunnel exposes publicly.
///
/// Parsed from a caller-supplied string that may omit its scheme; `http` is
/// assumed in that case. The registry keys tunnels by the caller's original
/// string, so `localhost:8080` and `http://localhost:8080` are distinct keys
/// even though they normalize to the same `Target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: String,
    scheme: String,
    host: String,
    port: u16,
}

impl Target {
    /// Parse a target string
    pub fn parse(raw: &str) -> Result<Self, TunnelError> {
        let invalid = |reason: &str| TunnelError::InvalidTarget {
            target: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty target"));
        }

        let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let url = Url::parse(&candidate).map_err(|e| invalid(&e.to_string()))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        Ok(Self {
            scheme: url.scheme().to_string(),
            url: candidate,
            host,
            port,
        })
    }

    /// URL scheme (`http` or `https`)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host name or address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port, falling back to the scheme default
    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL handed to the tunnel executable (the input with its scheme filled in)
    pub fn as_url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Lifecycle of a quick tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelState {
    /// Process spawned, waiting for the public URL
    Starting,
    /// Public URL captured
    Ready,
    /// Output ended or timed out before a URL appeared
    Failed,
    /// Torn down explicitly
    Stopped,
}

impl TunnelState {
    /// Whether the state is final for the start sequence
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TunnelState::Starting)
    }
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelState::Starting => write!(f, "starting"),
            TunnelState::Ready => write!(f, "ready"),
            TunnelState::Failed => write!(f, "failed"),
            TunnelState::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_with_scheme() {
        let target = Target::parse("https://localhost:1111").unwrap();
        assert_eq!(target.scheme(), "https");
        assert_eq!(target.host(), "localhost");
        assert_eq!(target.port(), 1111);
    }

    #[test]
    fn test_target_defaults_to_http() {
        let target = Target::parse("localhost:8080").unwrap();
        assert_eq!(target.scheme(), "http");
        assert_eq!(target.host(), "localhost");
        assert_eq!(target.port(), 8080);
        assert_eq!(target.as_url(), "http://localhost:8080");
    }

    #[test]
    fn test_target_known_default_port() {
        let target = Target::parse("https://example.internal").unwrap();
        assert_eq!(target.port(), 443);

        let target = Target::parse("10.0.0.5").unwrap();
        assert_eq!(target.port(), 80);
    }

    #[test]
    fn test_target_invalid() {
        for raw in ["", "   ", "http://", "localhost:notaport", "localhost:99999"] {
            let err = Target::parse(raw).unwrap_err();
            assert!(
                matches!(err, TunnelError::InvalidTarget { .. }),
                "expected InvalidTarget for {:?}, got {:?}",
                raw,
                err
            );
        }
    }

    #[test]
    fn test_tunnel_state_display() {
        assert_eq!(TunnelState::Ready.to_string(), "ready");
        assert!(TunnelState::Failed.is_terminal());
        assert!(!TunnelState::Starting.is_terminal());
    }
}
