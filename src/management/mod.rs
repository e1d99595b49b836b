//! Management endpoints served by the gateway itself.
//!
//! Access is governed by the rule table like any other path: with the
//! built-in table health, info and prometheus are public and everything else
//! under `/management` needs `ROLE_ADMIN`.

pub mod handlers;

use axum::{routing::get, Router};

use crate::http::server::AppState;

pub use handlers::{AppInfo, RuleView};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/management/health", get(handlers::health))
        .route("/management/health/liveness", get(handlers::liveness))
        .route("/management/health/readiness", get(handlers::readiness))
        .route("/management/info", get(handlers::info))
        .route("/management/prometheus", get(handlers::prometheus))
        .route("/management/rules", get(handlers::rules))
}
