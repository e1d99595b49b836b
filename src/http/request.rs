//! Request identification.
//!
//! # Responsibilities
//! - Assign every request an `x-request-id` (UUID v4) unless the client sent one
//! - Echo the id on the response
//! - Carry the id in the request's trace span
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The id is forwarded upstream unchanged

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::Span;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Read access to the request id.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> Option<&str> {
        self.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }
}

impl<B> RequestIdExt for axum::http::Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.headers().request_id()
    }
}

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Span for one request, tagged with its id.
pub fn request_span(request: &Request) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = request.request_id().unwrap_or("-"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_id_lookup() {
        let mut headers = HeaderMap::new();
        assert_eq!(headers.request_id(), None);
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc-123"));
        assert_eq!(headers.request_id(), Some("abc-123"));
    }
}
