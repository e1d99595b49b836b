//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the upstream base URL
//! - Strip hop-by-hop headers in both directions
//! - Add `X-Forwarded-For`, `X-Forwarded-Proto` and `X-Forwarded-Host`
//!
//! # Design Decisions
//! - Plain HTTP/1.1 to the upstream; TLS ends at the gateway
//! - No retries: requests are forwarded once, failures become 502

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        StatusCode, Uri, Version,
    },
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::config::schema::TimeoutConfig;
use crate::http::request::RequestIdExt;
use crate::http::response;
use crate::observability::metrics;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid upstream url `{0}`")]
    BaseUrl(String),

    #[error("cannot build upstream uri: {0}")]
    Uri(#[from] axum::http::Error),
}

/// Remove hop-by-hop headers, including any the `Connection` header names.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP.iter().chain(listed.iter()) {
        headers.remove(name);
    }
}

fn relay(upstream_response: hyper::Response<hyper::body::Incoming>) -> Response {
    let (mut parts, body) = upstream_response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

#[derive(Clone)]
pub struct Upstream {
    scheme: String,
    authority: String,
    base_path: String,
    client: Client<HttpConnector, Body>,
    forwarded_proto: &'static str,
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("authority", &self.authority)
            .field("base_path", &self.base_path)
            .finish()
    }
}

impl Upstream {
    pub fn new(url: &str, timeouts: &TimeoutConfig, tls: bool) -> Result<Self, ProxyError> {
        let base: Uri = url.parse().map_err(|_| ProxyError::BaseUrl(url.to_string()))?;
        let scheme = base.scheme_str().ok_or_else(|| ProxyError::BaseUrl(url.to_string()))?;
        let authority = base.authority().ok_or_else(|| ProxyError::BaseUrl(url.to_string()))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
            base_path: base.path().trim_end_matches('/').to_string(),
            client,
            forwarded_proto: if tls { "https" } else { "http" },
        })
    }

    /// Upstream URI for an incoming request URI.
    pub fn target(&self, uri: &Uri) -> Result<Uri, ProxyError> {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let target = Uri::builder()
            .scheme(self.scheme.as_str())
            .authority(self.authority.as_str())
            .path_and_query(format!("{}{}", self.base_path, path_and_query))
            .build()?;
        Ok(target)
    }

    fn prepare(&self, request: Request) -> Result<Request, ProxyError> {
        let client_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let (mut parts, body) = request.into_parts();
        parts.uri = self.target(&parts.uri)?;
        parts.version = Version::HTTP_11;

        let original_host = parts.headers.remove(header::HOST);
        strip_hop_by_hop(&mut parts.headers);

        if let Some(ip) = client_addr {
            let forwarded_for = match parts.headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
                Some(existing) => format!("{}, {}", existing, ip),
                None => ip.to_string(),
            };
            if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
                parts.headers.insert(X_FORWARDED_FOR, value);
            }
        }
        parts
            .headers
            .insert(X_FORWARDED_PROTO, HeaderValue::from_static(self.forwarded_proto));
        if let Some(host) = original_host {
            parts.headers.insert(X_FORWARDED_HOST, host);
        }

        Ok(Request::from_parts(parts, body))
    }

    /// Forward a request that passed the security chain.
    pub async fn forward(&self, request: Request) -> Response {
        let start = Instant::now();
        let path = request.uri().path().to_string();
        let request_id = request.request_id().unwrap_or("-").to_string();

        let outbound = match self.prepare(request) {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::error!(request_id = %request_id, path = %path, error = %e, "Cannot forward request");
                return response::error_response(StatusCode::BAD_GATEWAY, &path, Some("Upstream request failed"), None);
            }
        };

        match self.client.request(outbound).await {
            Ok(upstream_response) => {
                let status = upstream_response.status();
                metrics::record_upstream(status.as_u16(), start);
                tracing::debug!(
                    request_id = %request_id,
                    path = %path,
                    status = status.as_u16(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Upstream responded"
                );

                relay(upstream_response)
            }
            Err(e) => {
                metrics::record_upstream(StatusCode::BAD_GATEWAY.as_u16(), start);
                tracing::error!(
                    request_id = %request_id,
                    upstream = %self.authority,
                    path = %path,
                    error = %e,
                    "Upstream error"
                );
                response::error_response(StatusCode::BAD_GATEWAY, &path, Some("Upstream request failed"), None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_joins_base_path() {
        let upstream = Upstream::new("http://127.0.0.1:8081/app/", &TimeoutConfig::default(), false).unwrap();
        let target = upstream.target(&"/api/users?page=1".parse().unwrap()).unwrap();
        assert_eq!(target.to_string(), "http://127.0.0.1:8081/app/api/users?page=1");
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-internal"));
        headers.insert(HeaderName::from_static("x-internal"), HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::AUTHORIZATION));
    }

    #[test]
    fn test_rejects_relative_base() {
        assert!(Upstream::new("/relative", &TimeoutConfig::default(), false).is_err());
    }
}
