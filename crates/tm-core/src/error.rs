//! Core error types for the tunnel manager

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors produced by tunnel orchestration operations
#[derive(Error, Debug)]
pub enum TunnelError {
    /// Target string could not be parsed into scheme/host/port
    #[error("Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Public IP notification carried something that is not an IPv4 address
    #[error("Invalid IPv4 address: {0}")]
    InvalidIpAddress(String),

    /// No public IP has been reported yet
    #[error("Public IP not set")]
    PublicIpNotSet,

    /// The internal port is not exposed through an external mapping
    #[error("Port mapping not found: {0}")]
    PortMappingNotFound(String),

    /// The tunnel process never reported a public URL
    #[error("Failed to start tunnel for {target}: {reason}")]
    TunnelStartFailed { target: String, reason: String },

    /// No quick tunnel is registered for the target
    #[error("Quick tunnel not found: {0}")]
    TunnelNotFound(String),

    /// No named-tunnel credential is configured
    #[error("Named tunnels are disabled (no tunnel token configured)")]
    NamedTunnelDisabled,

    /// The named-tunnel config endpoint did not answer in time
    #[error("Timed out after {timeout:?} fetching tunnel config from {endpoint}")]
    ConfigFetchTimeout { endpoint: String, timeout: Duration },

    /// The named-tunnel config endpoint could not be reached
    #[error("Could not connect to tunnel config endpoint {endpoint}")]
    ConfigFetchConnectionError { endpoint: String },

    /// The named-tunnel config endpoint answered with a non-success status
    #[error("Tunnel config not found at {endpoint} (status {status})")]
    ConfigUnavailable { endpoint: String, status: u16 },

    /// The named-tunnel config body was not the expected JSON document
    #[error("Failed to parse tunnel config: {0}")]
    ConfigParseError(String),

    /// No ingress entry maps to the requested port
    #[error("Named tunnel not found for port {0}")]
    NamedRouteNotFound(u16),

    /// The tunnel executable could not be launched
    #[error("Failed to spawn {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tunnel process ignored both SIGTERM and SIGKILL within the stop timeout
    #[error("Process for {label} did not exit within {waited:?}")]
    TerminateTimeout { label: String, waited: Duration },

    /// I/O error while supervising a process
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T, E = TunnelError> = std::result::Result<T, E>;
