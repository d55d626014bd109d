//! Metadata Store domain models.
//!
//! Node and replica references are always by id (`String`), never by
//! pointer, keeping the object graph acyclic and trivially serializable.

use crate::chunk::ChunkId;
use serde::{Deserialize, Serialize};

/// A storage node known to the Master.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeState {
    pub node_id: String,
    pub host: String,
    pub port: u16,
    pub capacity_bytes: u64,
    pub free_bytes: u64,
    pub load_factor: f64,
    pub mac: String,
    /// Monotonic-comparable seconds since epoch of the last accepted heartbeat.
    pub last_seen: f64,
    pub healthy: bool,
}

impl NodeState {
    pub fn to_descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            node_id: self.node_id.clone(),
            host: self.host.clone(),
            grpc_port: self.port,
            capacity_bytes: self.capacity_bytes,
            free_bytes: self.free_bytes,
            mac: self.mac.clone(),
            healthy: self.healthy,
            last_seen: self.last_seen,
            load_factor: self.load_factor,
        }
    }
}

/// Wire-hydrated view of a node, used wherever a placement needs its replicas'
/// host/port filled in. Field is named `grpc_port` for interface-contract
/// compatibility even though this crate speaks HTTP, not gRPC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDescriptor {
    pub node_id: String,
    pub host: String,
    pub grpc_port: u16,
    pub capacity_bytes: u64,
    pub free_bytes: u64,
    pub mac: String,
    pub healthy: bool,
    pub last_seen: f64,
    pub load_factor: f64,
}

/// The identity and current replica set of one chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkPlacement {
    pub chunk_id: ChunkId,
    pub chunk_index: u64,
    /// Insertion order (first committed first). Duplicates forbidden.
    pub replicas: Vec<String>,
}

impl ChunkPlacement {
    pub fn new(chunk_id: ChunkId, chunk_index: u64) -> Self {
        ChunkPlacement {
            chunk_id,
            chunk_index,
            replicas: Vec::new(),
        }
    }

    /// Append `node_id` if not already present. Returns true if it was added.
    pub fn add_replica(&mut self, node_id: &str) -> bool {
        if self.replicas.iter().any(|r| r == node_id) {
            false
        } else {
            self.replicas.push(node_id.to_string());
            true
        }
    }
}

/// Metadata for one immutable blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub file_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub chunk_size: u64,
    /// Indexed by chunk_index, ascending, contiguous from 0.
    pub placements: Vec<ChunkPlacement>,
}

impl FileRecord {
    pub fn placement_by_chunk_id(&self, chunk_id: &str) -> Option<&ChunkPlacement> {
        self.placements.iter().find(|p| p.chunk_id.as_str() == chunk_id)
    }

    pub fn placement_by_chunk_id_mut(&mut self, chunk_id: &str) -> Option<&mut ChunkPlacement> {
        self.placements
            .iter_mut()
            .find(|p| p.chunk_id.as_str() == chunk_id)
    }
}

/// A pending move: pull `chunk_id` from `source_node_id` onto `target_node_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RebalanceInstruction {
    pub chunk_id: ChunkId,
    /// May be empty when no recorded replica is currently healthy.
    pub source_node_id: String,
    pub target_node_id: String,
}
