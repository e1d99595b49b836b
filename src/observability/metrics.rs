//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gatekeeper_decisions_total` (counter): authorization outcomes by decision
//! - `gatekeeper_firewall_rejections_total` (counter): rejected paths by reason
//! - `gatekeeper_cors_rejections_total` (counter): refused cross-origin requests
//! - `gatekeeper_upstream_requests_total` (counter): forwarded requests by status
//! - `gatekeeper_upstream_duration_seconds` (histogram): upstream latency
//!
//! # Design Decisions
//! - One process-wide Prometheus recorder, installed at most once
//! - Recording without an installed recorder is a no-op

use std::sync::OnceLock;
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::security::rules::Decision;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and return a handle for rendering.
///
/// Repeated calls return the first handle. If another recorder already owns
/// the global slot, a detached handle is returned and renders nothing.
pub fn init_metrics() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                tracing::info!("Prometheus recorder installed");
                handle
            }
            Err(e) => {
                tracing::warn!(error = %e, "Metrics recorder unavailable");
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

pub fn record_decision(decision: Decision) {
    metrics::counter!("gatekeeper_decisions_total", "decision" => decision.as_str()).increment(1);
}

pub fn record_firewall_rejection(reason: &'static str) {
    metrics::counter!("gatekeeper_firewall_rejections_total", "reason" => reason).increment(1);
}

pub fn record_cors_rejection() {
    metrics::counter!("gatekeeper_cors_rejections_total").increment(1);
}

pub fn record_upstream(status: u16, start: Instant) {
    metrics::counter!("gatekeeper_upstream_requests_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("gatekeeper_upstream_duration_seconds").record(start.elapsed().as_secs_f64());
}
