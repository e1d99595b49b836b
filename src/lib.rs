//! Gatekeeper: a stateless security gateway.
//!
//! Sits in front of a web application and enforces its security filter chain
//! (request firewall, SPA forwarding, bearer token authentication, ordered
//! URL-pattern authorization rules, security headers, CORS) before forwarding
//! allowed requests upstream.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──▶ request-id ─▶ trace ─▶ body limit ─▶ timeout ─▶ CORS
//!     ──▶ security chain (firewall ─▶ SPA ─▶ rules ─▶ token ─▶ decision ─▶ headers)
//!     ──▶ /management/* handlers  |  upstream forwarder ──▶ Application
//!
//!     Cross-cutting: config (profiles, reload) · observability · lifecycle
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod management;
pub mod net;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::GatekeeperConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
