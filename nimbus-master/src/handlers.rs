//! The RPC façade: `axum` JSON handlers sharing one `Arc<AppState>`.
//!
//! One span per operation; `info` on success, `warn` on a caller-fixable
//! rejection (unknown node/file, bad argument).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use nimbus_core::chunk::{parse_chunk_id, ChunkId};
use nimbus_core::error::NimbusError;
use nimbus_core::model::{ChunkPlacement, FileRecord};
use nimbus_protocol::{
    FileMetadataResponse, GetUploadPlanRequest, HeartbeatRequest, HeartbeatResponse,
    HydratedPlacement, ListFilesResponse, ListNodesResponse, ListRebalancesResponse, OkResponse,
    RegisterNodeRequest, ReportChunkStoredRequest, UploadPlanResponse,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::state::AppState;

/// Maps a [`NimbusError`] to an HTTP status plus a JSON `{ok:false,reason}`
/// body. No handler in this module ever panics on a condition this taxonomy
/// names.
pub struct ApiError(NimbusError);

impl From<NimbusError> for ApiError {
    fn from(e: NimbusError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            NimbusError::UnknownNode(_) | NimbusError::UnknownFile(_) => StatusCode::NOT_FOUND,
            NimbusError::InvalidArgument(_) | NimbusError::InvalidChunkId(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(OkResponse::err(self.0.to_string()))).into_response()
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/nodes/register", post(register_node))
        .route("/nodes/heartbeat", post(heartbeat))
        .route("/nodes", get(list_nodes))
        .route("/nodes/:node_id", delete(delete_node))
        .route("/nodes/:node_id/fail", post(fail_node))
        .route("/nodes/:node_id/restore", post(restore_node))
        .route("/files/plan", post(get_upload_plan))
        .route("/files/chunk-stored", post(report_chunk_stored))
        .route("/files/:file_id", get(get_file_metadata))
        .route("/files", get(list_files))
        .route("/rebalances", get(list_rebalances))
}

async fn hydrate_node(state: &AppState, node_id: &str) -> nimbus_core::model::NodeDescriptor {
    match state.store.get_node(node_id).await {
        Some(n) => n.to_descriptor(),
        None => nimbus_core::model::NodeDescriptor {
            node_id: node_id.to_string(),
            host: String::new(),
            grpc_port: 0,
            capacity_bytes: 0,
            free_bytes: 0,
            mac: String::new(),
            healthy: false,
            last_seen: 0.0,
            load_factor: 0.0,
        },
    }
}

async fn hydrate_placement(state: &AppState, placement: &ChunkPlacement) -> HydratedPlacement {
    let mut replicas = Vec::with_capacity(placement.replicas.len());
    for node_id in &placement.replicas {
        replicas.push(hydrate_node(state, node_id).await);
    }
    HydratedPlacement {
        chunk_id: placement.chunk_id.as_str().to_string(),
        chunk_index: placement.chunk_index,
        replicas,
    }
}

async fn hydrate_file(state: &AppState, file: &FileRecord) -> FileMetadataResponse {
    let mut placements = Vec::with_capacity(file.placements.len());
    for p in &file.placements {
        placements.push(hydrate_placement(state, p).await);
    }
    FileMetadataResponse {
        file_id: file.file_id.clone(),
        file_name: file.file_name.clone(),
        file_size: file.file_size,
        chunk_size: file.chunk_size,
        placements,
    }
}

#[instrument(skip(state, req), fields(node_id = %req.node.node_id))]
async fn register_node(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterNodeRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let node = nimbus_core::model::NodeState {
        node_id: req.node.node_id,
        host: req.node.host,
        port: req.node.grpc_port,
        capacity_bytes: req.node.capacity_bytes,
        free_bytes: req.node.free_bytes,
        load_factor: req.node.load_factor,
        mac: req.node.mac,
        last_seen: 0.0,
        healthy: true,
    };
    let node_id = node.node_id.clone();
    state.store.register_node(node).await?;
    info!(node_id, "node registered");
    metrics::gauge!("nimbus_registered_nodes").set(state.store.list_all_nodes().await.len() as f64);
    Ok(Json(OkResponse::ok()))
}

#[instrument(skip(state, req), fields(node_id = %req.node_id))]
async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    if state.queue.is_empty().await {
        let cfg = state.scheduler_config();
        nimbus_metadata::scheduler::tick(&state.store, &state.queue, &cfg).await;
    }

    state
        .store
        .update_heartbeat(&req.node_id, req.free_bytes, req.load_factor)
        .await?;

    let rebalances = state.queue.drain_for_target(&req.node_id).await;
    if !rebalances.is_empty() {
        metrics::counter!("rebalance_delivered_total").increment(rebalances.len() as u64);
    }
    Ok(Json(HeartbeatResponse { ok: true, rebalances }))
}

#[instrument(skip(state, req), fields(file_name = %req.file_name))]
async fn get_upload_plan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GetUploadPlanRequest>,
) -> Result<Json<UploadPlanResponse>, ApiError> {
    let healthy = state.store.list_healthy_nodes().await;
    let (chunk_size, placements) = nimbus_metadata::plan_upload(
        req.file_size,
        state.config.chunk_size,
        req.chunk_size,
        state.config.replication_factor,
        &healthy,
    );

    let file_id = req.file_id.unwrap_or_else(|| req.file_name.clone());
    let record = FileRecord {
        file_id: file_id.clone(),
        file_name: req.file_name,
        file_size: req.file_size,
        chunk_size,
        placements: placements.clone(),
    };
    state.store.put_file(record).await?;

    let mut hydrated = Vec::with_capacity(placements.len());
    for p in &placements {
        hydrated.push(hydrate_placement(&state, p).await);
    }

    info!(file_id, chunks = placements.len(), "upload plan issued");
    Ok(Json(UploadPlanResponse {
        file_id,
        chunk_size,
        replication_factor: state.config.replication_factor,
        placements: hydrated,
    }))
}

#[instrument(skip(state, req), fields(chunk_id = %req.chunk_id))]
async fn report_chunk_stored(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReportChunkStoredRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let chunk_id = ChunkId::from_raw(req.chunk_id.clone());
    state
        .store
        .update_chunk_replica(&req.file_id, &chunk_id, req.chunk_index, &req.node_id)
        .await?;
    metrics::counter!("rebalance_succeeded_total").increment(1);
    info!(file_id = %req.file_id, node_id = %req.node_id, "chunk stored");
    Ok(Json(OkResponse::ok()))
}

/// Accepts either a file id directly, or a chunk id (embedded `"{file_id}:{index}"`
/// form or fully opaque) and resolves it to the owning file. An opaque id that
/// embeds no file id is recovered by scanning every file's placements.
#[instrument(skip(state))]
async fn get_file_metadata(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<FileMetadataResponse>, ApiError> {
    let file = if let Some(f) = state.store.get_file(&file_id).await {
        f
    } else {
        let (owning_file_id, _) = parse_chunk_id(&file_id);
        match state.store.get_file(&owning_file_id).await {
            Some(f) => f,
            None => state
                .store
                .find_file_by_chunk_id(&file_id)
                .await
                .ok_or_else(|| NimbusError::UnknownFile(file_id.clone()))?,
        }
    };
    Ok(Json(hydrate_file(&state, &file).await))
}

async fn list_nodes(State(state): State<Arc<AppState>>) -> Json<ListNodesResponse> {
    let nodes = state
        .store
        .list_all_nodes()
        .await
        .into_iter()
        .map(|n| n.to_descriptor())
        .collect();
    Json(ListNodesResponse { nodes })
}

async fn list_files(State(state): State<Arc<AppState>>) -> Json<ListFilesResponse> {
    let mut files = Vec::new();
    for f in state.store.list_all_files().await {
        files.push(hydrate_file(&state, &f).await);
    }
    Json(ListFilesResponse { files })
}

async fn list_rebalances(State(state): State<Arc<AppState>>) -> Json<ListRebalancesResponse> {
    Json(ListRebalancesResponse {
        rebalances: state.queue.snapshot().await,
    })
}

#[instrument(skip(state))]
async fn fail_node(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
) -> Json<OkResponse> {
    match state.store.fail_node(&node_id).await {
        Ok(true) => {
            warn!(node_id, "admin marked node failed");
            Json(OkResponse::ok())
        }
        Ok(false) => Json(OkResponse::err(format!("unknown node: {node_id}"))),
        Err(e) => Json(OkResponse::err(e.to_string())),
    }
}

#[instrument(skip(state))]
async fn restore_node(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
) -> Json<OkResponse> {
    match state.store.restore_node(&node_id).await {
        Ok(true) => {
            info!(node_id, "admin restored node");
            Json(OkResponse::ok())
        }
        Ok(false) => Json(OkResponse::err(format!("unknown node: {node_id}"))),
        Err(e) => Json(OkResponse::err(e.to_string())),
    }
}

#[instrument(skip(state))]
async fn delete_node(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
) -> Json<OkResponse> {
    match state.store.delete_node(&node_id).await {
        Ok(true) => {
            info!(node_id, "admin deleted node");
            Json(OkResponse::ok())
        }
        Ok(false) => Json(OkResponse::err(format!("unknown node: {node_id}"))),
        Err(e) => Json(OkResponse::err(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MasterConfig;
    use nimbus_core::model::NodeDescriptor;

    async fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(MasterConfig::default()).await.unwrap())
    }

    #[tokio::test]
    async fn register_then_list() {
        let state = test_state().await;
        register_node(
            State(state.clone()),
            Json(RegisterNodeRequest {
                node: NodeDescriptor {
                    node_id: "n1".into(),
                    host: "127.0.0.1".into(),
                    grpc_port: 9100,
                    capacity_bytes: 1000,
                    free_bytes: 900,
                    mac: String::new(),
                    healthy: true,
                    last_seen: 0.0,
                    load_factor: 0.0,
                },
            }),
        )
        .await
        .unwrap();

        let Json(resp) = list_nodes(State(state)).await;
        assert_eq!(resp.nodes.len(), 1);
        assert_eq!(resp.nodes[0].node_id, "n1");
    }

    #[tokio::test]
    async fn upload_plan_then_report_round_trips() {
        let state = test_state().await;
        register_node(
            State(state.clone()),
            Json(RegisterNodeRequest {
                node: NodeDescriptor {
                    node_id: "n1".into(),
                    host: "127.0.0.1".into(),
                    grpc_port: 9100,
                    capacity_bytes: 1000,
                    free_bytes: 900,
                    mac: String::new(),
                    healthy: true,
                    last_seen: 0.0,
                    load_factor: 0.0,
                },
            }),
        )
        .await
        .unwrap();

        let Json(plan) = get_upload_plan(
            State(state.clone()),
            Json(GetUploadPlanRequest {
                file_id: None,
                file_name: "t.bin".into(),
                file_size: 15,
                chunk_size: Some(1024),
            }),
        )
        .await
        .unwrap();
        assert_eq!(plan.placements.len(), 1);
        assert_eq!(plan.placements[0].replicas.len(), 1);

        let chunk_id = plan.placements[0].chunk_id.clone();
        report_chunk_stored(
            State(state.clone()),
            Json(ReportChunkStoredRequest {
                file_id: plan.file_id.clone(),
                chunk_id,
                chunk_index: 0,
                node_id: "n1".into(),
            }),
        )
        .await
        .unwrap();

        let Json(meta) = get_file_metadata(State(state), Path(plan.file_id)).await.unwrap();
        assert_eq!(meta.placements[0].replicas[0].node_id, "n1");
    }

    #[tokio::test]
    async fn heartbeat_delivers_then_empties_queue() {
        let state = test_state().await;
        register_node(
            State(state.clone()),
            Json(RegisterNodeRequest {
                node: NodeDescriptor {
                    node_id: "n1".into(),
                    host: "h".into(),
                    grpc_port: 1,
                    capacity_bytes: 100,
                    free_bytes: 80,
                    mac: String::new(),
                    healthy: true,
                    last_seen: 0.0,
                    load_factor: 0.0,
                },
            }),
        )
        .await
        .unwrap();

        let chunk_id = ChunkId::generate();
        state
            .store
            .put_file(FileRecord {
                file_id: "f2".into(),
                file_name: "f2".into(),
                file_size: 4,
                chunk_size: 4,
                placements: vec![ChunkPlacement {
                    chunk_id: chunk_id.clone(),
                    chunk_index: 0,
                    replicas: vec![],
                }],
            })
            .await
            .unwrap();

        let Json(first) = heartbeat(
            State(state.clone()),
            Json(HeartbeatRequest {
                node_id: "n1".into(),
                free_bytes: 80,
                load_factor: 0.0,
            }),
        )
        .await
        .unwrap();
        assert_eq!(first.rebalances.len(), 1);
        assert_eq!(first.rebalances[0].target_node_id, "n1");

        // Commit the replica before the next heartbeat: with n1 the only
        // registered node, it is now the chunk's sole possible holder, so the
        // scheduler's opportunistic refresh has no remaining candidate target
        // and the second heartbeat drains nothing.
        report_chunk_stored(
            State(state.clone()),
            Json(ReportChunkStoredRequest {
                file_id: "f2".into(),
                chunk_id: chunk_id.as_str().to_string(),
                chunk_index: 0,
                node_id: "n1".into(),
            }),
        )
        .await
        .unwrap();

        let Json(second) = heartbeat(
            State(state),
            Json(HeartbeatRequest {
                node_id: "n1".into(),
                free_bytes: 80,
                load_factor: 0.0,
            }),
        )
        .await
        .unwrap();
        assert!(second.rebalances.is_empty());
    }

    #[tokio::test]
    async fn admin_delete_removes_node_but_keeps_placements() {
        let state = test_state().await;
        register_node(
            State(state.clone()),
            Json(RegisterNodeRequest {
                node: NodeDescriptor {
                    node_id: "n1".into(),
                    host: "h".into(),
                    grpc_port: 1,
                    capacity_bytes: 100,
                    free_bytes: 80,
                    mac: String::new(),
                    healthy: true,
                    last_seen: 0.0,
                    load_factor: 0.0,
                },
            }),
        )
        .await
        .unwrap();

        state
            .store
            .update_chunk_replica("f1", &ChunkId::generate(), 0, "n1")
            .await
            .unwrap();

        let Json(resp) = delete_node(State(state.clone()), Path("n1".to_string())).await;
        assert!(resp.ok);

        let Json(nodes) = list_nodes(State(state.clone())).await;
        assert!(nodes.nodes.is_empty());

        let Json(files) = list_files(State(state)).await;
        assert_eq!(files.files[0].placements[0].replicas[0].node_id, "n1");
    }
}
