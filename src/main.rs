use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gatekeeper::config::profile::PROFILES_ENV;
use gatekeeper::config::watcher::ConfigWatcher;
use gatekeeper::config::{load_profiled, ActiveProfiles};
use gatekeeper::lifecycle::signals::spawn_signal_handler;
use gatekeeper::observability::{logging, metrics};
use gatekeeper::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "gatekeeper", version, about = "Stateless security gateway")]
struct Args {
    /// Directory holding application.toml and its profile overlays
    #[arg(long, env = "GATEKEEPER_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Comma-separated active profiles (defaults to `dev`)
    #[arg(long, env = PROFILES_ENV)]
    profile: Option<String>,

    /// Disable hot reload of the config directory
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let profiles = ActiveProfiles::resolve(args.profile.as_deref());

    let config = load_profiled(&args.config_dir, &profiles)?;
    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), profiles = %profiles, "gatekeeper starting");
    if profiles.is_defaulted() {
        tracing::warn!("No active profile set, falling back to default profiles: {}", profiles);
    }
    if profiles.conflicting() {
        tracing::error!(
            "You have misconfigured your application! It should not run with both the 'dev' and 'prod' profiles at the same time."
        );
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = config.upstream.url.as_deref().unwrap_or("-"),
        request_timeout_secs = config.timeouts.request_secs,
        custom_rules = config.authorization.rules.is_some(),
        "Configuration loaded"
    );

    let metrics_handle = config.observability.metrics_enabled.then(metrics::init_metrics);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, &profiles, metrics_handle)?;

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let (watcher, config_updates) = ConfigWatcher::new(&args.config_dir, profiles.clone());
    let _watch_guard = if args.no_watch {
        None
    } else {
        match watcher.run() {
            Ok(guard) => Some(guard),
            Err(e) => {
                tracing::warn!(error = %e, "Config hot reload disabled");
                None
            }
        }
    };

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
