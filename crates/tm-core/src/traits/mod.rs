//! Core traits for the tunnel manager

mod port_mapping;

pub use port_mapping::{
    EnvPortMappings, LayeredPortMappings, PortMappingSource, StaticPortMappings,
};
