//! Rebalance Scheduler: periodic deficit detection and instruction planning.
//!
//! Each tick snapshots healthy nodes, finds under-replicated chunks, and
//! ranks replacement targets by (free_bytes desc, capacity_bytes desc),
//! preferring the healthiest recorded replica as the transfer source.

use crate::store::{MetadataStore, RebalanceQueue};
use nimbus_core::chunk::ChunkId;
use nimbus_core::model::RebalanceInstruction;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

pub struct SchedulerConfig {
    pub replication_factor: usize,
    pub default_chunk_size: u64,
    pub tick_period: Duration,
}

/// One (chunk_id, source, target) move, computed by [`plan_rebalances`].
pub type Rebalance = (ChunkId, String, String);

/// Compute the full set of rebalance moves for the current state, without
/// touching the queue. This is the pure core the periodic task wraps.
pub async fn plan_rebalances(store: &MetadataStore, config: &SchedulerConfig) -> Vec<Rebalance> {
    let healthy = store.list_healthy_nodes().await;
    let healthy_ids: HashSet<&str> = healthy.iter().map(|n| n.node_id.as_str()).collect();

    let mut moves = Vec::new();

    for file in store.list_all_files().await {
        let chunk_size = if file.chunk_size > 0 {
            file.chunk_size
        } else {
            config.default_chunk_size
        };

        for placement in &file.placements {
            let healthy_replica_count = placement
                .replicas
                .iter()
                .filter(|r| healthy_ids.contains(r.as_str()))
                .count();
            let deficit = config.replication_factor.saturating_sub(healthy_replica_count);
            if deficit == 0 {
                continue;
            }

            // Candidate targets: healthy, not already a replica, enough free space.
            let mut candidates: Vec<_> = healthy
                .iter()
                .filter(|n| {
                    !placement.replicas.iter().any(|r| r == &n.node_id) && n.free_bytes >= chunk_size
                })
                .collect();
            candidates.sort_by(|a, b| {
                (b.free_bytes, b.capacity_bytes).cmp(&(a.free_bytes, a.capacity_bytes))
            });

            // Source: healthiest replica by free_bytes, falling back to the
            // first recorded replica (possibly unhealthy) if none are healthy.
            let source = placement
                .replicas
                .iter()
                .filter_map(|r| healthy.iter().find(|n| &n.node_id == r))
                .max_by(|a, b| a.free_bytes.cmp(&b.free_bytes))
                .map(|n| n.node_id.clone())
                .or_else(|| placement.replicas.first().cloned())
                .unwrap_or_default();

            for target in candidates.into_iter().take(deficit) {
                moves.push((placement.chunk_id.clone(), source.clone(), target.node_id.clone()));
            }
        }
    }

    moves
}

/// One scheduler tick: compute moves and atomically replace the pending queue.
pub async fn tick(store: &MetadataStore, queue: &RebalanceQueue, config: &SchedulerConfig) -> usize {
    let moves = plan_rebalances(store, config).await;
    let count = moves.len();
    let instructions = moves
        .into_iter()
        .map(|(chunk_id, source, target)| RebalanceInstruction {
            chunk_id,
            source_node_id: source,
            target_node_id: target,
        })
        .collect();
    queue.replace(instructions).await;
    metrics::counter!("rebalance_planned_total").increment(count as u64);
    debug!(count, "rebalance scheduler tick planned instructions");
    count
}

/// Spawn the periodic scheduler task.
pub fn spawn(
    store: Arc<MetadataStore>,
    queue: Arc<RebalanceQueue>,
    config: SchedulerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.tick_period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    tick(&store, &queue, &config).await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_core::model::{ChunkPlacement, FileRecord, NodeState};

    fn node(id: &str, healthy: bool, last_seen: f64) -> NodeState {
        NodeState {
            node_id: id.to_string(),
            host: "h".into(),
            port: 1234,
            capacity_bytes: 100,
            free_bytes: 80,
            load_factor: 0.0,
            mac: String::new(),
            last_seen,
            healthy,
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            replication_factor: 2,
            default_chunk_size: 4,
            tick_period: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn suggests_new_target_when_replica_unhealthy() {
        let store = MetadataStore::new(15.0);
        store.register_node(node("n1", true, crate::store::now_secs())).await.unwrap();
        store.register_node(node("n2", true, crate::store::now_secs())).await.unwrap();
        // n2 goes stale.
        {
            let mut inner = store.inner.lock().await;
            inner.nodes.get_mut("n2").unwrap().last_seen = crate::store::now_secs() - 100.0;
        }

        let chunk_id = ChunkId::from_raw("f1:0");
        store
            .put_file(FileRecord {
                file_id: "f1".into(),
                file_name: "f1".into(),
                file_size: 10,
                chunk_size: 4,
                placements: vec![ChunkPlacement {
                    chunk_id: chunk_id.clone(),
                    chunk_index: 0,
                    replicas: vec!["n2".into()],
                }],
            })
            .await
            .unwrap();

        let moves = plan_rebalances(&store, &config()).await;
        assert_eq!(moves, vec![(chunk_id, "n2".to_string(), "n1".to_string())]);
    }

    #[tokio::test]
    async fn no_deficit_produces_no_moves() {
        let store = MetadataStore::new(15.0);
        store.register_node(node("n1", true, crate::store::now_secs())).await.unwrap();
        store.register_node(node("n2", true, crate::store::now_secs())).await.unwrap();

        store
            .put_file(FileRecord {
                file_id: "f1".into(),
                file_name: "f1".into(),
                file_size: 4,
                chunk_size: 4,
                placements: vec![ChunkPlacement {
                    chunk_id: ChunkId::generate(),
                    chunk_index: 0,
                    replicas: vec!["n1".into(), "n2".into()],
                }],
            })
            .await
            .unwrap();

        let mut cfg = config();
        cfg.replication_factor = 2;
        assert!(plan_rebalances(&store, &cfg).await.is_empty());
    }

    #[tokio::test]
    async fn tick_replaces_queue_atomically() {
        let store = MetadataStore::new(15.0);
        store.register_node(node("n1", true, crate::store::now_secs())).await.unwrap();
        store
            .put_file(FileRecord {
                file_id: "f2".into(),
                file_name: "f2".into(),
                file_size: 4,
                chunk_size: 4,
                placements: vec![ChunkPlacement {
                    chunk_id: ChunkId::generate(),
                    chunk_index: 0,
                    replicas: vec![],
                }],
            })
            .await
            .unwrap();

        let queue = RebalanceQueue::new();
        let mut cfg = config();
        cfg.replication_factor = 1;
        let count = tick(&store, &queue, &cfg).await;
        assert_eq!(count, 1);
        let drained = queue.drain_for_target("n1").await;
        assert_eq!(drained.len(), 1);
    }
}
