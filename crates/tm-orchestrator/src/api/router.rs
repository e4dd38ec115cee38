//! Control API router

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::ManagerState;

use super::handlers;

/// Build the control API router.
///
/// Quick tunnel routes take the target as a wildcard so full URLs such as
/// `https://localhost:1111` can be passed unescaped.
pub fn build_router(state: Arc<ManagerState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/set-public-ip/:ip", put(handlers::set_public_ip))
        .route("/get-direct-url/:port", get(handlers::get_direct_url))
        .route("/get-quick-tunnel/*target", get(handlers::get_quick_tunnel))
        .route(
            "/get-quick-tunnel-if-exists/*target",
            get(handlers::get_quick_tunnel_if_exists),
        )
        .route("/get-all-quick-tunnels", get(handlers::get_all_quick_tunnels))
        .route("/stop-quick-tunnel/*target", post(handlers::stop_quick_tunnel))
        .route(
            "/refresh-quick-tunnel/*target",
            post(handlers::refresh_quick_tunnel),
        )
        .route("/get-named-tunnel/:port", get(handlers::get_named_tunnel))
        .route("/get-named-tunnels", get(handlers::get_named_tunnels))
        .with_state(state)
}
