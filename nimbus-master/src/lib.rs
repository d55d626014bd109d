//! Nimbus Master
//!
//! Hosts the Metadata Store, Placement Planner, Liveness Monitor and
//! Rebalance Scheduler, fronted by an RPC Dispatcher realized as `axum`
//! JSON handlers.

pub mod handlers;
pub mod metrics;
pub mod state;

pub use state::{AppState, MasterConfig};

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the full HTTP router (dispatcher routes + health/version + metrics).
pub fn build_router(
    state: Arc<AppState>,
    metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> Router {
    let mut router = Router::new()
        .route("/health", axum::routing::get(health))
        .route("/version", axum::routing::get(version))
        .merge(handlers::routes());

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn version() -> &'static str {
    concat!("nimbus-master/", env!("CARGO_PKG_VERSION"))
}
