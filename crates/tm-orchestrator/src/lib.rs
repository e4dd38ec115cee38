//! tm-orchestrator: Tunnel manager daemon
//!
//! Supervises on-demand quick tunnels and the credentialed named tunnel,
//! keeps a registry of live tunnels, evicts tunnels whose process died, and
//! exposes all of it over a small HTTP control API.

pub mod api;
pub mod health;
pub mod manager;
pub mod named;
pub mod process;
pub mod quick;
pub mod registry;
pub mod state;

#[cfg(all(test, unix))]
mod testing;

pub use api::build_router;
pub use manager::TunnelManager;
pub use registry::TunnelRegistry;
pub use state::ManagerState;
