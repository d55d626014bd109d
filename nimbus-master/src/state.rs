//! Shared application state for the Master's HTTP dispatcher.

use nimbus_metadata::{MetadataStore, RebalanceQueue, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;

/// Runtime configuration for one Master process.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    pub chunk_size: u64,
    pub replication_factor: usize,
    pub heartbeat_timeout: f64,
    pub rebalance_interval: Duration,
    pub snapshot_path: Option<String>,
}

impl Default for MasterConfig {
    fn default() -> Self {
        MasterConfig {
            chunk_size: nimbus_core::DEFAULT_CHUNK_SIZE,
            replication_factor: nimbus_core::DEFAULT_REPLICATION_FACTOR,
            heartbeat_timeout: 15.0,
            rebalance_interval: Duration::from_secs(10),
            snapshot_path: None,
        }
    }
}

/// Everything a handler needs, shared via `Arc` across the `axum::Router`.
pub struct AppState {
    pub store: Arc<MetadataStore>,
    pub queue: Arc<RebalanceQueue>,
    pub config: MasterConfig,
}

impl AppState {
    pub async fn new(config: MasterConfig) -> anyhow::Result<Self> {
        let mut store = MetadataStore::new(config.heartbeat_timeout);
        if let Some(path) = &config.snapshot_path {
            let snapshot = nimbus_metadata::SnapshotStore::open(std::path::Path::new(path)).await?;
            store = store.with_snapshot(snapshot).await?;
        }

        Ok(AppState {
            store: Arc::new(store),
            queue: Arc::new(RebalanceQueue::new()),
            config,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            replication_factor: self.config.replication_factor,
            default_chunk_size: self.config.chunk_size,
            tick_period: self.config.rebalance_interval,
        }
    }
}
