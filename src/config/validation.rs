//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Build every security component once so bad secrets, headers or rules fail at load time
//! - Validate value ranges (timeouts > 0, body limit > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatekeeperConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::GatekeeperConfig;
use crate::security::cors::{cors_layer, CorsError};
use crate::security::headers::{HeaderError, SecurityHeaders};
use crate::security::rules::{RuleError, RuleTable};
use crate::security::token::{TokenError, TokenVerifier};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("listener.tls.{field} `{path}` does not exist")]
    TlsFile { field: &'static str, path: String },

    #[error("upstream.url `{url}`: {reason}")]
    Upstream { url: String, reason: String },

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("security.max_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("security.jwt: {0}")]
    Jwt(#[from] TokenError),

    #[error("security: {0}")]
    Headers(#[from] HeaderError),

    #[error("authorization.rules: {0}")]
    Rules(#[from] RuleError),

    #[error("cors: {0}")]
    Cors(#[from] CorsError),

    #[error("observability.log_level `{0}` is not a valid filter")]
    LogLevel(String),
}

pub fn validate_config(config: &GatekeeperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if let Some(tls) = &config.listener.tls {
        for (field, path) in [("cert_path", &tls.cert_path), ("key_path", &tls.key_path)] {
            if !Path::new(path).is_file() {
                errors.push(ValidationError::TlsFile {
                    field,
                    path: path.clone(),
                });
            }
        }
    }

    if let Some(url) = &config.upstream.url {
        let reason = match url::Url::parse(url) {
            Ok(parsed) if parsed.scheme() != "http" => Some("only http upstreams are supported".to_string()),
            Ok(parsed) if parsed.host_str().is_none() => Some("missing host".to_string()),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = reason {
            errors.push(ValidationError::Upstream {
                url: url.clone(),
                reason,
            });
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if let Err(e) = TokenVerifier::from_config(&config.security.jwt) {
        errors.push(e.into());
    }

    if let Err(e) = SecurityHeaders::from_config(&config.security, config.listener.tls.is_some()) {
        errors.push(e.into());
    }

    if let Some(rules) = &config.authorization.rules {
        if let Err(e) = RuleTable::from_config(rules) {
            errors.push(e.into());
        }
    }

    if let Err(e) = cors_layer(&config.cors) {
        errors.push(e.into());
    }

    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
