//! Nimbus control-plane wire protocol.
//!
//! These are the request/response bodies exchanged between storage agents (or
//! the admin CLI) and the Master's HTTP+JSON dispatcher. They deliberately
//! mirror the interface contract's logical message shapes rather than any
//! particular internal representation; no transport stub codegen is involved.

use nimbus_core::{NodeDescriptor, RebalanceInstruction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterNodeRequest {
    pub node: NodeDescriptor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl OkResponse {
    pub fn ok() -> Self {
        OkResponse { ok: true, reason: None }
    }

    pub fn err(reason: impl Into<String>) -> Self {
        OkResponse {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub node_id: String,
    pub free_bytes: u64,
    #[serde(default)]
    pub load_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub ok: bool,
    pub rebalances: Vec<RebalanceInstruction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUploadPlanRequest {
    #[serde(default)]
    pub file_id: Option<String>,
    pub file_name: String,
    pub file_size: u64,
    /// A positive override replaces the configured chunk size for this plan only.
    #[serde(default)]
    pub chunk_size: Option<u64>,
}

/// A hydrated placement, i.e. a [`ChunkPlacement`] whose replica ids are
/// additionally resolved to full node descriptors for the caller's convenience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydratedPlacement {
    pub chunk_id: String,
    pub chunk_index: u64,
    pub replicas: Vec<NodeDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPlanResponse {
    pub file_id: String,
    pub chunk_size: u64,
    pub replication_factor: usize,
    pub placements: Vec<HydratedPlacement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportChunkStoredRequest {
    pub file_id: String,
    pub chunk_id: String,
    pub chunk_index: u64,
    pub node_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadataResponse {
    pub file_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub chunk_size: u64,
    pub placements: Vec<HydratedPlacement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListNodesResponse {
    pub nodes: Vec<NodeDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFilesResponse {
    pub files: Vec<FileMetadataResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRebalancesResponse {
    pub rebalances: Vec<RebalanceInstruction>,
}

/// Re-exported so callers depending only on `nimbus-protocol` don't also need
/// a direct `nimbus-core` dependency just to read a placement back.
pub use nimbus_core::model as domain;
