//! Liveness Monitor: periodic overdue-node sweep.
//!
//! Ticks at `max(1s, heartbeat_timeout / 2)`, marking any node whose last
//! heartbeat is older than `heartbeat_timeout` as unhealthy. Idempotent —
//! re-marking an already-unhealthy node is a no-op.

use crate::store::MetadataStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Runs `overdue_nodes()` / `mark_unhealthy()` once, every `period`, until
/// `shutdown` fires. Returns the join handle so callers can await a clean
/// shutdown.
pub fn spawn(
    store: Arc<MetadataStore>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    run_once(&store).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

/// Period the spec calls for: max(1s, heartbeat_timeout / 2).
pub fn tick_period(heartbeat_timeout: f64) -> Duration {
    Duration::from_secs_f64((heartbeat_timeout / 2.0).max(1.0))
}

async fn run_once(store: &MetadataStore) {
    for node in store.overdue_nodes().await {
        if node.healthy {
            info!(
                node_id = %node.node_id,
                overdue_secs = crate::store::now_secs() - node.last_seen,
                "liveness monitor marking node unhealthy"
            );
        }
        let _ = store.mark_unhealthy(&node.node_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_core::model::NodeState;

    fn node(id: &str, last_seen: f64, healthy: bool) -> NodeState {
        NodeState {
            node_id: id.to_string(),
            host: "h".into(),
            port: 1,
            capacity_bytes: 100,
            free_bytes: 80,
            load_factor: 0.0,
            mac: String::new(),
            last_seen,
            healthy,
        }
    }

    #[tokio::test]
    async fn marks_overdue_node_unhealthy() {
        let store = Arc::new(MetadataStore::new(0.1));
        store.register_node(node("n1", 0.0, true)).await.unwrap();
        {
            let mut inner = store.inner.lock().await;
            inner.nodes.get_mut("n1").unwrap().last_seen = crate::store::now_secs() - 1.0;
        }

        run_once(&store).await;

        let got = store.get_node("n1").await.unwrap();
        assert!(!got.healthy);
    }

    #[test]
    fn tick_period_has_one_second_floor() {
        assert_eq!(tick_period(0.1), Duration::from_secs(1));
        assert_eq!(tick_period(30.0), Duration::from_secs(15));
    }
}
