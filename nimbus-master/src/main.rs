//! Nimbus Master binary: wires configuration, background tasks and the HTTP
//! dispatcher together, then serves until shutdown.
//!
//! Background tasks (liveness monitor, rebalance scheduler) and the HTTP
//! server race a shared `tokio::sync::watch` shutdown signal driven by
//! ctrl_c/SIGTERM.

use clap::Parser;
use nimbus_master::{build_router, AppState, MasterConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "nimbus-master")]
#[command(about = "Nimbus master: metadata, placement, liveness and rebalancing")]
struct Cli {
    /// Bind address for the HTTP dispatcher.
    #[arg(long, env = "NIMBUS_MASTER_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "NIMBUS_MASTER_PORT", default_value_t = 7700)]
    port: u16,

    #[arg(long, env = "NIMBUS_CHUNK_SIZE", default_value_t = nimbus_core::DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    #[arg(long, env = "NIMBUS_REPLICATION_FACTOR", default_value_t = nimbus_core::DEFAULT_REPLICATION_FACTOR)]
    replication_factor: usize,

    #[arg(long, env = "NIMBUS_HEARTBEAT_TIMEOUT", default_value_t = 15.0)]
    heartbeat_timeout: f64,

    #[arg(long, env = "NIMBUS_REBALANCE_INTERVAL", default_value_t = 10)]
    rebalance_interval_secs: u64,

    /// Optional SQLite snapshot path; durability is disabled when unset.
    #[arg(long, env = "NIMBUS_SNAPSHOT_PATH")]
    snapshot_path: Option<String>,

    /// Optional metrics port; the metrics endpoint is disabled when unset.
    /// When equal to `port`, `/metrics` is served on the main listener.
    #[arg(long, env = "NIMBUS_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// `pretty` (default, human-readable) or `json`.
    #[arg(long, default_value = "pretty")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_format);

    info!(host = %cli.host, port = cli.port, "starting nimbus-master");

    let config = MasterConfig {
        chunk_size: cli.chunk_size,
        replication_factor: cli.replication_factor,
        heartbeat_timeout: cli.heartbeat_timeout,
        rebalance_interval: Duration::from_secs(cli.rebalance_interval_secs),
        snapshot_path: cli.snapshot_path.clone(),
    };

    let state = Arc::new(AppState::new(config).await?);

    let metrics_handle = cli.metrics_port.map(|_| nimbus_master::metrics::init_metrics());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let liveness_period = nimbus_metadata::liveness::tick_period(state.config.heartbeat_timeout);
    let _liveness = nimbus_metadata::spawn_liveness_monitor(
        state.store.clone(),
        liveness_period,
        shutdown_rx.clone(),
    );
    let _scheduler = nimbus_metadata::spawn_rebalance_scheduler(
        state.store.clone(),
        state.queue.clone(),
        state.scheduler_config(),
        shutdown_rx.clone(),
    );
    info!("liveness monitor and rebalance scheduler started");

    let app = build_router(state.clone(), metrics_handle.clone());

    let addr: std::net::SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "dispatcher listening");

    if let (Some(metrics_port), Some(handle)) = (cli.metrics_port, metrics_handle) {
        if metrics_port != cli.port {
            let metrics_app = nimbus_master::metrics::routes::<()>(handle).with_state(());
            let metrics_addr: std::net::SocketAddr = format!("{}:{}", cli.host, metrics_port).parse()?;
            tokio::spawn(async move {
                if let Ok(listener) = tokio::net::TcpListener::bind(metrics_addr).await {
                    info!(%metrics_addr, "metrics listening");
                    let _ = axum::serve(listener, metrics_app).await;
                }
            });
        }
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    info!("nimbus-master shutdown complete");
    Ok(())
}

fn init_tracing(format: &str) {
    let subscriber = tracing_subscriber::fmt().with_max_level(Level::INFO).with_target(true);
    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
    }
}
