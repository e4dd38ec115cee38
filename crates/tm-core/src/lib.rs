//! tm-core: Core abstractions and configuration for the tunnel manager
//!
//! This crate provides the shared types, error taxonomy, configuration and
//! named-tunnel ingress schema used by the orchestrator daemon.

pub mod config;
pub mod error;
pub mod ingress;
pub mod traits;
pub mod types;

pub use error::{ConfigError, TunnelError};
pub use types::{Target, TunnelState};
