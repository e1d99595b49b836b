//! Security response headers.
//!
//! # Responsibilities
//! - Build the header set once from configuration
//! - Write it onto every response, including ones the timeout, body limit and CORS layers produce
//!
//! # Design Decisions
//! - Policy headers always override what the upstream sent
//! - Cache headers are only added when the upstream did not set them
//! - HSTS only when the listener terminates TLS

use axum::http::header::{
    HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, CACHE_CONTROL,
    CONTENT_SECURITY_POLICY, EXPIRES, PRAGMA, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
    X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use thiserror::Error;

use crate::config::schema::SecurityConfig;

pub const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

#[derive(Debug, Error)]
#[error("invalid value for {name}: {source}")]
pub struct HeaderError {
    name: &'static str,
    #[source]
    source: InvalidHeaderValue,
}

#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    overriding: Vec<(HeaderName, HeaderValue)>,
    if_absent: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn from_config(config: &SecurityConfig, tls: bool) -> Result<Self, HeaderError> {
        let csp = HeaderValue::from_str(&config.content_security_policy).map_err(|source| HeaderError {
            name: "content_security_policy",
            source,
        })?;
        let permissions = HeaderValue::from_str(&config.permissions_policy).map_err(|source| HeaderError {
            name: "permissions_policy",
            source,
        })?;

        let mut overriding = vec![
            (CONTENT_SECURITY_POLICY, csp),
            (X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
            (REFERRER_POLICY, HeaderValue::from_static("strict-origin-when-cross-origin")),
            (PERMISSIONS_POLICY, permissions),
            (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (X_XSS_PROTECTION, HeaderValue::from_static("0")),
        ];
        if tls {
            overriding.push((
                STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static("max-age=31536000 ; includeSubDomains"),
            ));
        }

        let if_absent = vec![
            (
                CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, max-age=0, must-revalidate"),
            ),
            (PRAGMA, HeaderValue::from_static("no-cache")),
            (EXPIRES, HeaderValue::from_static("0")),
        ];

        Ok(Self { overriding, if_absent })
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.overriding {
            headers.insert(name.clone(), value.clone());
        }
        // Cache headers travel as a group: an upstream that set any of them owns caching.
        if !self.if_absent.iter().any(|(name, _)| headers.contains_key(name)) {
            for (name, value) in &self.if_absent {
                headers.insert(name.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applies_policy_headers() {
        let headers = SecurityHeaders::from_config(&SecurityConfig::default(), false).unwrap();
        let mut map = HeaderMap::new();
        map.insert(X_FRAME_OPTIONS, HeaderValue::from_static("ALLOW"));
        headers.apply(&mut map);

        assert_eq!(map[X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(map[REFERRER_POLICY], "strict-origin-when-cross-origin");
        assert_eq!(
            map[CONTENT_SECURITY_POLICY],
            SecurityConfig::default().content_security_policy.as_str()
        );
        assert!(map[PERMISSIONS_POLICY].to_str().unwrap().starts_with("camera=()"));
        assert_eq!(map[CACHE_CONTROL], "no-cache, no-store, max-age=0, must-revalidate");
        assert!(!map.contains_key(STRICT_TRANSPORT_SECURITY));
    }

    #[test]
    fn test_keeps_upstream_cache_headers() {
        let headers = SecurityHeaders::from_config(&SecurityConfig::default(), true).unwrap();
        let mut map = HeaderMap::new();
        map.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=31536000"));
        headers.apply(&mut map);

        assert_eq!(map[CACHE_CONTROL], "public, max-age=31536000");
        assert!(!map.contains_key(PRAGMA));
        assert!(map.contains_key(STRICT_TRANSPORT_SECURITY));
    }

    #[test]
    fn test_rejects_invalid_policy() {
        let config = SecurityConfig {
            content_security_policy: "default-src 'self'\n".into(),
            ..SecurityConfig::default()
        };
        assert!(SecurityHeaders::from_config(&config, false).is_err());
    }
}
