//! The storage agent's control loop: register, heartbeat, execute rebalance
//! instructions.
//!
//! Disk stats are sampled via [`nimbus_storage::StorageBackend::stats`] on
//! every heartbeat tick; shutdown is a `tokio::select!` race against the
//! watch channel so an in-flight heartbeat finishes before the process exits.

use nimbus_core::chunk::ChunkId;
use nimbus_core::model::NodeDescriptor;
use nimbus_protocol::{
    HeartbeatRequest, HeartbeatResponse, RegisterNodeRequest, ReportChunkStoredRequest,
};
use nimbus_storage::StorageBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::AgentConfig;

pub struct AgentState {
    pub node_id: String,
    pub public_host: String,
    pub port: u16,
    pub master_base_url: String,
    pub storage: Arc<dyn StorageBackend>,
    pub http: reqwest::Client,
    pub heartbeat_interval: Duration,
}

impl AgentState {
    pub fn new(config: &AgentConfig, storage: Arc<dyn StorageBackend>) -> Self {
        AgentState {
            node_id: config.resolved_node_id(),
            public_host: config.public_host.clone(),
            port: config.port,
            master_base_url: config.master_base_url(),
            storage,
            http: reqwest::Client::new(),
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs),
        }
    }

    async fn descriptor(&self) -> anyhow::Result<NodeDescriptor> {
        let stats = self.storage.stats().await?;
        Ok(NodeDescriptor {
            node_id: self.node_id.clone(),
            host: self.public_host.clone(),
            grpc_port: self.port,
            capacity_bytes: stats.bytes_capacity,
            free_bytes: stats.bytes_available(),
            mac: String::new(),
            healthy: true,
            last_seen: 0.0,
            load_factor: stats.usage_percent(),
        })
    }

    pub async fn register(&self) -> anyhow::Result<()> {
        let node = self.descriptor().await?;
        let resp: nimbus_protocol::OkResponse = self
            .http
            .post(format!("{}/nodes/register", self.master_base_url))
            .json(&RegisterNodeRequest { node })
            .send()
            .await?
            .json()
            .await?;
        if !resp.ok {
            anyhow::bail!("master rejected registration: {}", resp.reason.unwrap_or_default());
        }
        info!(node_id = %self.node_id, "registered with master");
        Ok(())
    }

    async fn heartbeat_once(&self) {
        let stats = match self.storage.stats().await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to sample storage stats");
                return;
            }
        };

        let req = HeartbeatRequest {
            node_id: self.node_id.clone(),
            free_bytes: stats.bytes_available(),
            load_factor: stats.usage_percent(),
        };

        let resp = self
            .http
            .post(format!("{}/nodes/heartbeat", self.master_base_url))
            .json(&req)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let resp: HeartbeatResponse = match resp {
            Ok(r) => match r.json().await {
                Ok(body) => body,
                Err(e) => {
                    error!(error = %e, "malformed heartbeat response");
                    return;
                }
            },
            Err(e) => {
                warn!(error = %e, "heartbeat failed, will retry next tick");
                return;
            }
        };

        for instruction in resp.rebalances {
            if instruction.target_node_id != self.node_id || instruction.source_node_id.is_empty() {
                continue;
            }
            let state = self.clone_handles();
            tokio::spawn(async move {
                if let Err(e) = run_replication_job(&state, instruction.chunk_id, instruction.source_node_id).await
                {
                    error!(error = %e, "replication job failed");
                }
            });
        }
    }

    fn clone_handles(&self) -> ReplicationHandles {
        ReplicationHandles {
            node_id: self.node_id.clone(),
            master_base_url: self.master_base_url.clone(),
            storage: self.storage.clone(),
            http: self.http.clone(),
        }
    }
}

/// The subset of [`AgentState`] a spawned replication job needs; cloned out
/// so the job doesn't hold a borrow across an `.await` inside `tokio::spawn`.
struct ReplicationHandles {
    node_id: String,
    master_base_url: String,
    storage: Arc<dyn StorageBackend>,
    http: reqwest::Client,
}

async fn run_replication_job(
    state: &ReplicationHandles,
    chunk_id: ChunkId,
    source_node_id: String,
) -> anyhow::Result<()> {
    let file: nimbus_protocol::FileMetadataResponse = state
        .http
        .get(format!("{}/files/{}", state.master_base_url, chunk_id.as_str()))
        .send()
        .await?
        .json()
        .await?;

    let placement = file
        .placements
        .iter()
        .find(|p| p.chunk_id == chunk_id.as_str())
        .ok_or_else(|| anyhow::anyhow!("chunk {} not found in file {}", chunk_id, file.file_id))?;

    let source = placement
        .replicas
        .iter()
        .find(|r| r.node_id == source_node_id)
        .ok_or_else(|| anyhow::anyhow!("source node {} has no known address", source_node_id))?;

    let bytes = state
        .http
        .get(format!("http://{}:{}/chunks/{}", source.host, source.grpc_port, chunk_id.as_str()))
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    state.storage.put(&chunk_id, bytes).await?;

    let resp: nimbus_protocol::OkResponse = state
        .http
        .post(format!("{}/files/chunk-stored", state.master_base_url))
        .json(&ReportChunkStoredRequest {
            file_id: file.file_id.clone(),
            chunk_id: chunk_id.as_str().to_string(),
            chunk_index: placement.chunk_index,
            node_id: state.node_id.clone(),
        })
        .send()
        .await?
        .json()
        .await?;

    if !resp.ok {
        anyhow::bail!("master rejected chunk-stored report: {}", resp.reason.unwrap_or_default());
    }

    info!(chunk_id = %chunk_id, source = %source_node_id, "replicated chunk");
    Ok(())
}

/// Runs the heartbeat loop until `shutdown` fires.
pub async fn run(state: Arc<AgentState>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(state.heartbeat_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                state.heartbeat_once().await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("control loop shutting down");
                    break;
                }
            }
        }
    }
}
