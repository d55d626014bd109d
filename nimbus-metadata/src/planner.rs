//! Placement Planner: pure, side-effect-free chunk/replica assignment.

use nimbus_core::chunk::ChunkId;
use nimbus_core::model::{ChunkPlacement, NodeState};

/// Rank nodes by (free_bytes desc, port desc) and take the first `replication_factor`.
fn pick_nodes(healthy_nodes: &[NodeState], replication_factor: usize) -> Vec<String> {
    let mut ranked: Vec<&NodeState> = healthy_nodes.iter().collect();
    ranked.sort_by(|a, b| (b.free_bytes, b.port).cmp(&(a.free_bytes, a.port)));
    ranked
        .into_iter()
        .take(replication_factor)
        .map(|n| n.node_id.clone())
        .collect()
}

/// Plan the chunking and initial replica assignment for a new upload.
///
/// Returns `(effective_chunk_size, placements)`. `chunk_size_override`, when
/// `Some` and positive, replaces `default_chunk_size` for this plan only.
pub fn plan_upload(
    file_size: u64,
    default_chunk_size: u64,
    chunk_size_override: Option<u64>,
    replication_factor: usize,
    healthy_nodes: &[NodeState],
) -> (u64, Vec<ChunkPlacement>) {
    let chunk_size = match chunk_size_override {
        Some(override_size) if override_size > 0 => override_size,
        _ => default_chunk_size,
    };

    let total_chunks = if file_size == 0 {
        1
    } else {
        file_size.div_ceil(chunk_size).max(1)
    };

    let placements = (0..total_chunks)
        .map(|chunk_index| {
            let chunk_id = ChunkId::generate();
            let mut placement = ChunkPlacement::new(chunk_id, chunk_index);
            for node_id in pick_nodes(healthy_nodes, replication_factor) {
                placement.add_replica(&node_id);
            }
            placement
        })
        .collect();

    (chunk_size, placements)
}
