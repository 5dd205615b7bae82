//! Error taxonomy for the vendor gateway, alert store, and request dispatcher.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Errors raised by the HTTP gateway (C1): auth, rate limiting, transport.
#[derive(Debug, thiserror::Error)]
pub enum VendorError {
    #[error("credential exchange failed: {0}")]
    AuthFailed(String),

    #[error("request queue is full")]
    QueueFull,

    #[error("request timed out waiting in queue")]
    QueueTimeout,

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("vendor returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed vendor payload: {0}")]
    MalformedPayload(String),
}

/// Errors surfaced at the request dispatcher (C4), mapped to the
/// `{detail, err?, status?}` response shape documented in the external
/// interface section.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Vendor(#[from] VendorError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Unauthorized => StatusCode::UNAUTHORIZED,
            DispatchError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DispatchError::Vendor(VendorError::RateLimited { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::Vendor(VendorError::QueueFull)
            | DispatchError::Vendor(VendorError::QueueTimeout) => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::Vendor(_) => StatusCode::BAD_GATEWAY,
            DispatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            detail: self.to_string(),
            err: Some(format!("{:?}", self).split_whitespace().next().unwrap_or("Error").to_string()),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_maps_to_service_unavailable() {
        let e = DispatchError::Vendor(VendorError::RateLimited { retry_after_ms: 500 });
        assert_eq!(e.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        assert_eq!(DispatchError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn upstream_status_maps_to_bad_gateway() {
        let e = DispatchError::Vendor(VendorError::UpstreamStatus { status: 500, body: "oops".into() });
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
    }
}
