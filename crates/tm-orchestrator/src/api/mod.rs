//! HTTP control surface

mod error;
mod handlers;
mod router;

pub use error::{ApiError, ErrorResponse};
pub use handlers::{
    DirectUrlResponse, HealthResponse, MessageResponse, PublicIpResponse, TunnelEntry,
    TunnelUrlResponse,
};
pub use router::build_router;
