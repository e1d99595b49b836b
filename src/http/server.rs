//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with management routes and the forwarding fallback
//! - Wire up middleware (request ID, tracing, security headers, limits, timeout, CORS, security chain)
//! - Serve plain HTTP or TLS on the given listener
//! - Swap in a new security chain when the configuration changes

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware,
    response::Response,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::profile::ActiveProfiles;
use crate::config::GatekeeperConfig;
use crate::http::proxy::{ProxyError, Upstream};
use crate::http::request::{propagate_request_id_layer, request_span, set_request_id_layer};
use crate::http::response;
use crate::management::{self, AppInfo};
use crate::net::tls::{load_tls_config, TlsError};
use crate::security::chain::{self, ChainError, SecurityChain, SharedChain};
use crate::security::cors::{cors_layer, CorsError};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("cors: {0}")]
    Cors(#[from] CorsError),

    #[error("upstream: {0}")]
    Upstream(#[from] ProxyError),

    #[error("tls: {0}")]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub chain: SharedChain,
    pub upstream: Option<Upstream>,
    pub info: Arc<AppInfo>,
    pub metrics: Option<PrometheusHandle>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatekeeperConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// `metrics` backs `/management/prometheus`; pass `None` to serve 404 there.
    pub fn new(
        config: GatekeeperConfig,
        profiles: &ActiveProfiles,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self, ServerError> {
        let chain = SecurityChain::from_config(&config)?.into_shared();

        let tls = config.listener.tls.is_some();
        let upstream = match &config.upstream.url {
            Some(url) => Some(Upstream::new(url, &config.timeouts, tls)?),
            None => None,
        };

        let info = Arc::new(AppInfo {
            name: config.app.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_profiles: profiles.names().to_vec(),
        });

        let state = AppState {
            chain,
            upstream,
            info,
            metrics: metrics.filter(|_| config.observability.metrics_enabled),
        };

        let router = Self::build_router(&config, state.clone())?;
        Ok(Self { router, config, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatekeeperConfig, state: AppState) -> Result<Router, ServerError> {
        let routes = Router::new()
            .merge(management::routes())
            .fallback(proxy_handler)
            .with_state(state.clone());

        let mut router = routes.layer(middleware::from_fn_with_state(
            state.chain.clone(),
            chain::security_filter,
        ));
        if let Some(cors) = cors_layer(&config.cors)? {
            router = router.layer(cors);
        }

        // Headers go outside everything that can answer on its own (408, 413, preflight).
        Ok(router
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(middleware::from_fn_with_state(state.chain, chain::security_headers))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| request_span(request)))
            .layer(set_request_id_layer()))
    }

    /// The fully layered router, e.g. for driving with `oneshot`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatekeeperConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configs arriving on `config_updates` replace the security chain; the
    /// listener, CORS (including the same-origin guard) and upstream keep
    /// their startup settings.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatekeeperConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            tls = self.config.listener.tls.is_some(),
            "HTTP server starting"
        );

        let shared = self.state.chain.clone();
        let reloader = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                match SecurityChain::from_config(&new_config) {
                    Ok(next) => {
                        let next = next.with_same_origin_guard(shared.load().same_origin_guard());
                        let rules = next.rules().len();
                        shared.store(Arc::new(next));
                        tracing::info!(rules, "Security chain reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected reloaded config. Keeping current security chain.");
                    }
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let served = match &self.config.listener.tls {
            None => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                        tracing::info!("Shutdown signal received");
                    })
                    .await
            }
            Some(tls) => {
                let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
                let handle = axum_server::Handle::new();
                let trigger = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    tracing::info!("Shutdown signal received");
                    trigger.graceful_shutdown(Some(DRAIN_TIMEOUT));
                });

                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app)
                    .await
            }
        };

        reloader.abort();
        served?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Fallback handler: everything the security chain allowed that is not a
/// management endpoint goes upstream.
async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    match &state.upstream {
        Some(upstream) => upstream.forward(request).await,
        None => {
            let path = request.uri().path().to_string();
            tracing::debug!(path = %path, "No upstream configured");
            response::error_response(StatusCode::NOT_FOUND, &path, Some("No upstream configured"), None)
        }
    }
}
