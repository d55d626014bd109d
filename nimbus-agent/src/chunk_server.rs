//! Peer-to-peer chunk transfer endpoint: `GET /chunks/:chunk_id`.
//!
//! Not part of the Master's own API; this is the agent-side listener other
//! agents' replication jobs fetch from.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use nimbus_core::chunk::ChunkId;
use std::sync::Arc;

use crate::control_loop::AgentState;

pub fn routes() -> Router<Arc<AgentState>> {
    Router::new()
        .route("/chunks/:chunk_id", get(get_chunk))
        .route("/health", get(|| async { "OK" }))
}

async fn get_chunk(State(state): State<Arc<AgentState>>, Path(chunk_id): Path<String>) -> impl IntoResponse {
    let id = ChunkId::from_raw(chunk_id);
    match state.storage.get(&id).await {
        Ok(Some(bytes)) => (StatusCode::OK, bytes).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "chunk not found").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
