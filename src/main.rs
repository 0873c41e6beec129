//! Process entry point.
//!
//! Reads tunables (optional TOML via `CONFIG_FILE`) and the required
//! `BACKENDS` list, wires up the subsystems, and serves ingress plus
//! admin on one listener until interrupted.

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rondo::config;
use rondo::http::HttpServer;
use rondo::lifecycle::Shutdown;
use rondo::observability::exporter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rondo=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("rondo v{} starting", env!("CARGO_PKG_VERSION"));

    let config = config::load_from_env()?;
    let backends = config::backends_from_env()?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = backends.len(),
        probe_interval_secs = config.health_check.interval_secs,
        forward_timeout_secs = config.timeouts.forward_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => exporter::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let server = HttpServer::new(config, backends);
    server.run(listener, shutdown.handle()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
