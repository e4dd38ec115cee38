//! Quick tunnels: one ephemeral `cloudflared --url` process per target

mod scanner;
mod tunnel;

pub use scanner::{extract_tunnel_url, PROVIDER_DOMAIN};
pub use tunnel::{QuickTunnel, QuickTunnelSettings};
