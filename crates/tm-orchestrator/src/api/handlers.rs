//! Control API handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::state::ManagerState;

use super::error::Result;

/// Response for `/set-public-ip`
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicIpResponse {
    pub status: String,
    pub ip: String,
}

/// Response for `/get-direct-url`
#[derive(Debug, Serialize, Deserialize)]
pub struct DirectUrlResponse {
    pub result: String,
}

/// Response carrying a single public tunnel URL
#[derive(Debug, Serialize, Deserialize)]
pub struct TunnelUrlResponse {
    pub tunnel_url: String,
}

/// One `{targetUrl, tunnelUrl}` pair in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelEntry {
    pub target_url: String,
    pub tunnel_url: String,
}

/// Response for `/stop-quick-tunnel`
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Response for `/health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub quick_tunnels: usize,
    /// `running`, `stopped` or `disabled`
    pub named_tunnel: String,
}

pub async fn set_public_ip(
    State(state): State<Arc<ManagerState>>,
    Path(ip): Path<String>,
) -> Result<Json<PublicIpResponse>> {
    let ip = state.set_public_ip(&ip)?;
    Ok(Json(PublicIpResponse {
        status: "success".to_string(),
        ip: ip.to_string(),
    }))
}

pub async fn get_direct_url(
    State(state): State<Arc<ManagerState>>,
    Path(port): Path<u16>,
) -> Result<Json<DirectUrlResponse>> {
    let result = state.direct_url(port)?;
    Ok(Json(DirectUrlResponse { result }))
}

/// Get or start the quick tunnel for `target`.
///
/// A target that cannot be parsed is rejected with 400 before anything is
/// spawned; failures to bring the tunnel up are 500.
pub async fn get_quick_tunnel(
    State(state): State<Arc<ManagerState>>,
    Path(target): Path<String>,
) -> Result<Json<TunnelUrlResponse>> {
    let tunnel = state.registry.get_or_create(&target).await?;
    Ok(Json(TunnelUrlResponse {
        tunnel_url: tunnel.url().unwrap_or_default(),
    }))
}

pub async fn get_quick_tunnel_if_exists(
    State(state): State<Arc<ManagerState>>,
    Path(target): Path<String>,
) -> Result<Json<TunnelUrlResponse>> {
    let tunnel = state.registry.get_existing(&target)?;
    Ok(Json(TunnelUrlResponse {
        tunnel_url: tunnel.url().unwrap_or_default(),
    }))
}

pub async fn get_all_quick_tunnels(
    State(state): State<Arc<ManagerState>>,
) -> Json<Vec<TunnelEntry>> {
    let mut entries: Vec<_> = state
        .registry
        .list_all()
        .into_iter()
        .map(|(target_url, tunnel_url)| TunnelEntry {
            target_url,
            tunnel_url,
        })
        .collect();
    entries.sort_by(|a, b| a.target_url.cmp(&b.target_url));
    Json(entries)
}

pub async fn stop_quick_tunnel(
    State(state): State<Arc<ManagerState>>,
    Path(target): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.registry.stop(&target).await?;
    Ok(Json(MessageResponse {
        message: "Quick tunnel stopped successfully".to_string(),
    }))
}

pub async fn refresh_quick_tunnel(
    State(state): State<Arc<ManagerState>>,
    Path(target): Path<String>,
) -> Result<Json<TunnelUrlResponse>> {
    let tunnel = state.registry.refresh(&target).await?;
    Ok(Json(TunnelUrlResponse {
        tunnel_url: tunnel.url().unwrap_or_default(),
    }))
}

pub async fn get_named_tunnel(
    State(state): State<Arc<ManagerState>>,
    Path(port): Path<u16>,
) -> Result<Json<TunnelUrlResponse>> {
    let tunnel_url = state.named.get_named(port).await?;
    Ok(Json(TunnelUrlResponse { tunnel_url }))
}

pub async fn get_named_tunnels(
    State(state): State<Arc<ManagerState>>,
) -> Result<Json<Vec<TunnelEntry>>> {
    let routes = state.named.list().await?;
    Ok(Json(
        routes
            .into_iter()
            .map(|route| TunnelEntry {
                tunnel_url: route.public_url(),
                target_url: route.service,
            })
            .collect(),
    ))
}

pub async fn health(State(state): State<Arc<ManagerState>>) -> Json<HealthResponse> {
    let named_tunnel = if !state.named.is_enabled() {
        "disabled"
    } else if state.named.is_running().await {
        "running"
    } else {
        "stopped"
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        quick_tunnels: state.registry.len(),
        named_tunnel: named_tunnel.to_string(),
    })
}
