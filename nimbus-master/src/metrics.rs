//! Prometheus metrics exposition for the Master.

use axum::{routing::get, Router};
use std::sync::Arc;

/// Install the Prometheus recorder as the global `metrics` backend. Call once
/// at start-up before any `counter!`/`gauge!` call fires.
pub fn init_metrics() -> metrics_exporter_prometheus::PrometheusHandle {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus metrics recorder")
}

/// `GET /metrics` route, mergeable into any `Router<S>`.
pub fn routes<S: Clone + Send + Sync + 'static>(
    handle: metrics_exporter_prometheus::PrometheusHandle,
) -> Router<S> {
    let handle = Arc::new(handle);
    Router::new().route(
        "/metrics",
        get(move || {
            let h = handle.clone();
            async move { h.render() }
        }),
    )
}
