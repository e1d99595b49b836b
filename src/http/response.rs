//! Error responses produced by the gateway itself.
//!
//! # Responsibilities
//! - 401 with a bearer challenge (`WWW-Authenticate`)
//! - 403 with an `insufficient_scope` challenge, or without one for refused cross-origin requests
//! - 400 for firewall rejections, 404/502 for forwarding failures
//!
//! # Design Decisions
//! - Small JSON bodies: `{"status", "error", "path", "detail"?}`
//! - Challenge parameters follow RFC 6750 section 3

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub const BEARER_ERROR_URI: &str = "https://tools.ietf.org/html/rfc6750#section-3.1";

const INSUFFICIENT_SCOPE_DESCRIPTION: &str =
    "The request requires higher privileges than provided by the access token.";

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    status: u16,
    error: &'a str,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
}

/// Build a bearer challenge; quotes in the description are replaced so the header stays well-formed.
pub fn bearer_challenge(error: &str, description: &str) -> String {
    format!(
        "Bearer error=\"{}\", error_description=\"{}\", error_uri=\"{}\"",
        error,
        description.replace('"', "'"),
        BEARER_ERROR_URI
    )
}

pub fn error_response(
    status: StatusCode,
    path: &str,
    detail: Option<&str>,
    challenge: Option<String>,
) -> Response {
    let body = ErrorBody {
        status: status.as_u16(),
        error: status.canonical_reason().unwrap_or("Error"),
        path,
        detail,
    };
    let mut response = (status, Json(body)).into_response();

    if let Some(challenge) = challenge {
        let value = HeaderValue::from_str(&challenge)
            .unwrap_or_else(|_| HeaderValue::from_static("Bearer"));
        response.headers_mut().insert(WWW_AUTHENTICATE, value);
    }
    response
}

/// No credentials were presented for a protected resource.
pub fn unauthorized(path: &str) -> Response {
    error_response(
        StatusCode::UNAUTHORIZED,
        path,
        Some("Full authentication is required to access this resource"),
        Some("Bearer".to_string()),
    )
}

/// A bearer token was presented but rejected.
pub fn invalid_token(path: &str, description: &str) -> Response {
    error_response(
        StatusCode::UNAUTHORIZED,
        path,
        Some(description),
        Some(bearer_challenge("invalid_token", description)),
    )
}

/// Authenticated, but lacking the required authority.
pub fn forbidden(path: &str) -> Response {
    error_response(
        StatusCode::FORBIDDEN,
        path,
        Some("Access is denied"),
        Some(bearer_challenge("insufficient_scope", INSUFFICIENT_SCOPE_DESCRIPTION)),
    )
}

/// Cross-origin request refused while no origin is allowed.
pub fn invalid_cors_request(path: &str) -> Response {
    error_response(StatusCode::FORBIDDEN, path, Some("Invalid CORS request"), None)
}

pub fn bad_request(path: &str, reason: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, path, Some(reason), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_has_plain_bearer_challenge() {
        let response = unauthorized("/api/x");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn test_invalid_token_challenge() {
        let response = invalid_token("/api/x", "Jwt \"expired\"");
        let challenge = response.headers()[WWW_AUTHENTICATE].to_str().unwrap().to_string();
        assert_eq!(
            challenge,
            "Bearer error=\"invalid_token\", error_description=\"Jwt 'expired'\", \
             error_uri=\"https://tools.ietf.org/html/rfc6750#section-3.1\""
        );
    }

    #[test]
    fn test_forbidden_challenge() {
        let response = forbidden("/api/admin/x");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let challenge = response.headers()[WWW_AUTHENTICATE].to_str().unwrap();
        assert!(challenge.starts_with("Bearer error=\"insufficient_scope\""));
    }
}
