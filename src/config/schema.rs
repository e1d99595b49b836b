//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatekeeperConfig {
    pub app: AppConfig,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Where allowed requests are forwarded.
    pub upstream: UpstreamConfig,

    pub timeouts: TimeoutConfig,

    /// Response headers, body limit and bearer token settings.
    pub security: SecurityConfig,

    pub cors: CorsConfig,

    pub authorization: AuthorizationConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Reported by `/management/info`.
    pub name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "gatekeeper".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the protected application (e.g., "http://127.0.0.1:8081").
    /// Without one, only management endpoints are served.
    pub url: Option<String>,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

pub const DEFAULT_CONTENT_SECURITY_POLICY: &str = "default-src 'self'; frame-src 'self' data:; \
     script-src 'self' 'unsafe-inline' 'unsafe-eval' https://storage.googleapis.com; \
     style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self' data:";

pub const DEFAULT_PERMISSIONS_POLICY: &str = "camera=(), fullscreen=(self), geolocation=(), gyroscope=(), \
     magnetometer=(), microphone=(), midi=(), payment=(), sync-xhr=()";

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub content_security_policy: String,

    pub permissions_policy: String,

    /// Maximum body size in bytes.
    pub max_body_size: usize,

    pub jwt: JwtConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            content_security_policy: DEFAULT_CONTENT_SECURITY_POLICY.to_string(),
            permissions_policy: DEFAULT_PERMISSIONS_POLICY.to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
            jwt: JwtConfig::default(),
        }
    }
}

/// Bearer token settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Base64-encoded HMAC secret. Required.
    pub base64_secret: Option<String>,

    /// HS256, HS384 or HS512.
    pub algorithm: String,

    /// Claim holding the granted authorities.
    pub authorities_claim: String,

    /// Clock skew tolerated on `exp`/`nbf`, in seconds.
    pub leeway_secs: u64,

    /// Expected `iss`, checked only when set.
    pub issuer: Option<String>,

    /// Lifetime of tokens minted by the CLI.
    pub token_validity_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            base64_secret: None,
            algorithm: "HS512".to_string(),
            authorities_claim: "auth".to_string(),
            leeway_secs: 60,
            issuer: None,
            token_validity_secs: 86_400,
        }
    }
}

/// Cross-origin settings. Empty origins disable CORS entirely.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: Vec::new(),
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            allow_credentials: false,
            max_age_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Replaces the built-in rule table when set. Order is significant.
    pub rules: Option<Vec<RuleConfig>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    PermitAll,
    Authenticated,
    HasAuthority,
    HasAnyAuthority,
    DenyAll,
}

/// One authorization rule as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    pub patterns: Vec<String>,

    /// Restrict the rule to one HTTP method.
    #[serde(default)]
    pub method: Option<String>,

    pub access: AccessKind,

    #[serde(default)]
    pub authorities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Serve `/management/prometheus`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: true,
        }
    }
}
