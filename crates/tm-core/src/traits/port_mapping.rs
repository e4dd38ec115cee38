//! External port mapping lookup
//!
//! GPU-rental hosts publish each container port on a different external port
//! and advertise the pairing through environment variables such as
//! `VAST_TCP_PORT_1111=40001`. A missing mapping means the port is not exposed.

use std::collections::HashMap;

/// Source of internal → external port mappings
pub trait PortMappingSource: Send + Sync {
    /// External port for an internal port, if the port is exposed
    fn external_port(&self, internal: u16) -> Option<String>;

    /// Name of the setting consulted for `internal`, used in error messages
    fn describe(&self, internal: u16) -> String;
}

/// Reads mappings from the process environment at lookup time
#[derive(Debug, Clone)]
pub struct EnvPortMappings {
    prefix: String,
}

impl EnvPortMappings {
    /// Create a lookup that reads `{prefix}{port}`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl PortMappingSource for EnvPortMappings {
    fn external_port(&self, internal: u16) -> Option<String> {
        std::env::var(self.describe(internal))
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn describe(&self, internal: u16) -> String {
        format!("{}{}", self.prefix, internal)
    }
}

/// Fixed set of mappings
#[derive(Debug, Clone, Default)]
pub struct StaticPortMappings {
    mappings: HashMap<u16, u16>,
}

impl StaticPortMappings {
    pub fn new(mappings: HashMap<u16, u16>) -> Self {
        Self { mappings }
    }

    /// Add a mapping
    pub fn with(mut self, internal: u16, external: u16) -> Self {
        self.mappings.insert(internal, external);
        self
    }
}

impl PortMappingSource for StaticPortMappings {
    fn external_port(&self, internal: u16) -> Option<String> {
        self.mappings.get(&internal).map(|p| p.to_string())
    }

    fn describe(&self, internal: u16) -> String {
        format!("port mapping for {}", internal)
    }
}

/// Static mappings take precedence, everything else falls through to `fallback`
pub struct LayeredPortMappings<F> {
    overrides: StaticPortMappings,
    fallback: F,
}

impl<F: PortMappingSource> LayeredPortMappings<F> {
    pub fn new(overrides: StaticPortMappings, fallback: F) -> Self {
        Self {
            overrides,
            fallback,
        }
    }
}

impl<F: PortMappingSource> PortMappingSource for LayeredPortMappings<F> {
    fn external_port(&self, internal: u16) -> Option<String> {
        self.overrides
            .external_port(internal)
            .or_else(|| self.fallback.external_port(internal))
    }

    fn describe(&self, internal: u16) -> String {
        self.fallback.describe(internal)
    }
}
