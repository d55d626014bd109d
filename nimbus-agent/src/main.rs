//! Nimbus storage agent binary.

use clap::Parser;
use nimbus_agent::{chunk_server, config::AgentConfig, control_loop, AgentState};
use nimbus_storage::FilesystemBackend;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AgentConfig::parse();
    init_tracing(&config.log_format);

    let backend = FilesystemBackend::open(config.data_dir.clone(), config.capacity_bytes).await?;
    let state = Arc::new(AgentState::new(&config, Arc::new(backend)));

    info!(node_id = %state.node_id, master = %state.master_base_url, "starting nimbus-agent");
    state.register().await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let control_state = state.clone();
    let control_rx = shutdown_rx.clone();
    let control_handle = tokio::spawn(async move {
        control_loop::run(control_state, control_rx).await;
    });

    let app = chunk_server::routes().with_state(state.clone());
    let addr: std::net::SocketAddr = format!("0.0.0.0:{}", state.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "chunk transfer endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = control_handle.await;
    info!("nimbus-agent shutdown complete");
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
