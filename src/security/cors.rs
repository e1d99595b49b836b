//! Cross-origin policy.
//!
//! With allowed origins configured a `tower-http` [`CorsLayer`] negotiates
//! CORS. With none, no layer is built and the security chain refuses every
//! cross-origin request, preflights included, through [`SameOriginGuard`].

use std::time::Duration;

use axum::http::{
    header::{HOST, ORIGIN},
    uri::Authority,
    HeaderMap, HeaderName, HeaderValue, Method, Uri,
};
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders};
use url::Url;

use crate::config::schema::CorsConfig;
use crate::config::GatekeeperConfig;

#[derive(Debug, Error)]
pub enum CorsError {
    #[error("invalid origin `{0}`")]
    Origin(String),

    #[error("invalid method `{0}`")]
    Method(String),

    #[error("invalid header name `{0}`")]
    Header(String),

    #[error("exposed headers cannot be `*` when credentials are allowed")]
    ExposeWildcardWithCredentials,
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == "*")
}

fn header_names(values: &[String]) -> Result<Vec<HeaderName>, CorsError> {
    values
        .iter()
        .map(|v| HeaderName::try_from(v.as_str()).map_err(|_| CorsError::Header(v.clone())))
        .collect()
}

pub fn cors_layer(config: &CorsConfig) -> Result<Option<CorsLayer>, CorsError> {
    if config.allowed_origins.is_empty() {
        return Ok(None);
    }

    let origins = if is_wildcard(&config.allowed_origins) {
        if config.allow_credentials {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::from(Any)
        }
    } else {
        let list = config
            .allowed_origins
            .iter()
            .map(|o| HeaderValue::from_str(o).map_err(|_| CorsError::Origin(o.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(list)
    };

    let methods = if is_wildcard(&config.allowed_methods) {
        AllowMethods::mirror_request()
    } else {
        let list = config
            .allowed_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| CorsError::Method(m.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowMethods::list(list)
    };

    let headers = if is_wildcard(&config.allowed_headers) {
        AllowHeaders::mirror_request()
    } else {
        AllowHeaders::list(header_names(&config.allowed_headers)?)
    };

    let exposed = if is_wildcard(&config.exposed_headers) {
        if config.allow_credentials {
            return Err(CorsError::ExposeWildcardWithCredentials);
        }
        ExposeHeaders::any()
    } else {
        ExposeHeaders::list(header_names(&config.exposed_headers)?)
    };

    let layer = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .expose_headers(exposed)
        .allow_credentials(config.allow_credentials)
        .max_age(Duration::from_secs(config.max_age_secs));

    Ok(Some(layer))
}

/// Refuses cross-origin requests when no origin is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SameOriginGuard {
    tls: bool,
}

impl SameOriginGuard {
    /// `Some` only when `[cors]` allows no origin.
    pub fn from_config(config: &GatekeeperConfig) -> Option<Self> {
        config.cors.allowed_origins.is_empty().then_some(Self {
            tls: config.listener.tls.is_some(),
        })
    }

    /// True when the request carries an `Origin` other than its own
    /// scheme, host and port. An unparseable origin (`null` included) or a
    /// request without a host counts as cross-origin.
    pub fn rejects(&self, headers: &HeaderMap, uri: &Uri) -> bool {
        let Some(origin) = headers.get(ORIGIN) else {
            return false;
        };
        let Some(origin) = origin.to_str().ok().and_then(|o| Url::parse(o).ok()) else {
            return true;
        };

        let scheme = uri.scheme_str().unwrap_or(if self.tls { "https" } else { "http" });
        let authority = match uri.authority() {
            Some(authority) => Some(authority.clone()),
            None => headers
                .get(HOST)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.parse::<Authority>().ok()),
        };
        let Some(authority) = authority else {
            return true;
        };

        let request_port = authority.port_u16().or(match scheme {
            "https" => Some(443),
            "http" => Some(80),
            _ => None,
        });

        let same = origin.scheme().eq_ignore_ascii_case(scheme)
            && origin
                .host_str()
                .is_some_and(|host| host.eq_ignore_ascii_case(authority.host()))
            && origin.port_or_known_default() == request_port;
        !same
    }
}
