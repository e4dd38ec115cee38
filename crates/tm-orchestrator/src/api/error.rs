//! API error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tm_core::TunnelError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{detail}")]
    BadRequest { kind: &'static str, detail: String },

    #[error("{detail}")]
    NotFound { kind: &'static str, detail: String },

    #[error("{detail}")]
    Internal { kind: &'static str, detail: String },
}

/// JSON error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest { kind, .. }
            | ApiError::NotFound { kind, .. }
            | ApiError::Internal { kind, .. } => kind,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.kind().to_string(),
            detail: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<TunnelError> for ApiError {
    fn from(err: TunnelError) -> Self {
        let detail = err.to_string();
        match err {
            TunnelError::InvalidTarget { .. } => ApiError::BadRequest {
                kind: "invalid_target",
                detail,
            },
            TunnelError::InvalidIpAddress(_) => ApiError::Internal {
                kind: "invalid_ip_address",
                detail,
            },
            TunnelError::PublicIpNotSet => ApiError::Internal {
                kind: "public_ip_not_set",
                detail,
            },
            TunnelError::PortMappingNotFound(_) => ApiError::NotFound {
                kind: "port_mapping_not_found",
                detail,
            },
            TunnelError::TunnelStartFailed { .. } => ApiError::Internal {
                kind: "tunnel_start_failed",
                detail,
            },
            TunnelError::TunnelNotFound(_) => ApiError::NotFound {
                kind: "tunnel_not_found",
                detail,
            },
            TunnelError::NamedTunnelDisabled => ApiError::NotFound {
                kind: "named_tunnel_disabled",
                detail,
            },
            TunnelError::ConfigFetchTimeout { .. } => ApiError::NotFound {
                kind: "config_fetch_timeout",
                detail,
            },
            TunnelError::ConfigFetchConnectionError { .. } => ApiError::NotFound {
                kind: "config_fetch_connection_error",
                detail,
            },
            TunnelError::ConfigUnavailable { .. } => ApiError::NotFound {
                kind: "config_unavailable",
                detail,
            },
            TunnelError::ConfigParseError(_) => ApiError::Internal {
                kind: "config_parse_error",
                detail,
            },
            TunnelError::NamedRouteNotFound(_) => ApiError::NotFound {
                kind: "named_route_not_found",
                detail,
            },
            TunnelError::Spawn { .. } | TunnelError::TerminateTimeout { .. } | TunnelError::Io(_) => {
                tracing::error!("Internal error: {}", detail);
                ApiError::Internal {
                    kind: "internal_error",
                    detail: "Internal server error".to_string(),
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
