//! The Metadata Store: the single source of truth for node and file state.
//!
//! Mutations are guarded by a `tokio::sync::Mutex` rather than a sync lock,
//! so the optional SQLite durability flush can run inside the same critical
//! section as the in-memory mutation without blocking the executor.

use nimbus_core::chunk::ChunkId;
use nimbus_core::error::{NimbusError, Result};
use nimbus_core::model::{ChunkPlacement, FileRecord, NodeState, RebalanceInstruction};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::debug;

use crate::snapshot::SnapshotStore;

pub(crate) fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

pub(crate) struct Inner {
    pub(crate) nodes: HashMap<String, NodeState>,
    pub(crate) files: HashMap<String, FileRecord>,
}

/// The authoritative registry of nodes and files.
pub struct MetadataStore {
    pub(crate) inner: Mutex<Inner>,
    heartbeat_timeout: f64,
    snapshot: Option<SnapshotStore>,
}

impl MetadataStore {
    pub fn new(heartbeat_timeout: f64) -> Self {
        MetadataStore {
            inner: Mutex::new(Inner {
                nodes: HashMap::new(),
                files: HashMap::new(),
            }),
            heartbeat_timeout,
            snapshot: None,
        }
    }

    /// Attach a durability backend and rehydrate from it if it already holds state.
    pub async fn with_snapshot(mut self, snapshot: SnapshotStore) -> Result<Self> {
        let (nodes, files) = snapshot.load().await?;
        {
            let mut inner = self.inner.lock().await;
            inner.nodes = nodes;
            inner.files = files;
        }
        self.snapshot = Some(snapshot);
        Ok(self)
    }

    async fn flush_locked(&self, inner: &Inner) -> Result<()> {
        if let Some(snapshot) = &self.snapshot {
            snapshot.save(&inner.nodes, &inner.files).await?;
        }
        Ok(())
    }

    /// Insert or replace a node by id. Sets last_seen = now, healthy = true.
    pub async fn register_node(&self, mut node: NodeState) -> Result<()> {
        let mut inner = self.inner.lock().await;
        node.last_seen = now_secs();
        node.healthy = true;
        inner.nodes.insert(node.node_id.clone(), node);
        self.flush_locked(&inner).await
    }

    /// Update heartbeat-reported fields. Fails with `UnknownNode` if the node
    /// has never registered.
    pub async fn update_heartbeat(
        &self,
        node_id: &str,
        free_bytes: u64,
        load_factor: f64,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let node = inner
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| NimbusError::UnknownNode(node_id.to_string()))?;
        node.free_bytes = free_bytes;
        node.load_factor = load_factor;
        node.last_seen = now_secs();
        node.healthy = true;
        self.flush_locked(&inner).await
    }

    /// Clear the healthy flag. Silent no-op if the node is unknown.
    pub async fn mark_unhealthy(&self, node_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(node) = inner.nodes.get_mut(node_id) {
            if node.healthy {
                node.healthy = false;
                debug!(node_id, "marked node unhealthy");
            }
        }
        self.flush_locked(&inner).await
    }

    /// Admin override: set healthy := false without touching last_seen.
    pub async fn fail_node(&self, node_id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let found = if let Some(node) = inner.nodes.get_mut(node_id) {
            node.healthy = false;
            true
        } else {
            false
        };
        self.flush_locked(&inner).await?;
        Ok(found)
    }

    /// Admin override: set healthy := true without touching last_seen. The
    /// override is authoritative only until the next heartbeat, which always
    /// resets healthy := true anyway.
    pub async fn restore_node(&self, node_id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let found = if let Some(node) = inner.nodes.get_mut(node_id) {
            node.healthy = true;
            true
        } else {
            false
        };
        self.flush_locked(&inner).await?;
        Ok(found)
    }

    /// Nodes with healthy = true and a fresh heartbeat.
    pub async fn list_healthy_nodes(&self) -> Vec<NodeState> {
        let inner = self.inner.lock().await;
        let now = now_secs();
        inner
            .nodes
            .values()
            .filter(|n| n.healthy && now - n.last_seen <= self.heartbeat_timeout)
            .cloned()
            .collect()
    }

    /// Nodes whose last heartbeat is older than the timeout, regardless of
    /// their current healthy flag.
    pub async fn overdue_nodes(&self) -> Vec<NodeState> {
        let inner = self.inner.lock().await;
        let now = now_secs();
        inner
            .nodes
            .values()
            .filter(|n| now - n.last_seen > self.heartbeat_timeout)
            .cloned()
            .collect()
    }

    pub async fn list_all_nodes(&self) -> Vec<NodeState> {
        self.inner.lock().await.nodes.values().cloned().collect()
    }

    pub async fn get_node(&self, node_id: &str) -> Option<NodeState> {
        self.inner.lock().await.nodes.get(node_id).cloned()
    }

    /// Removes the node. File placements are left untouched; stale replica
    /// ids are treated as unhealthy and repaired by the scheduler.
    pub async fn delete_node(&self, node_id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let removed = inner.nodes.remove(node_id).is_some();
        self.flush_locked(&inner).await?;
        Ok(removed)
    }

    pub async fn put_file(&self, record: FileRecord) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.files.insert(record.file_id.clone(), record);
        self.flush_locked(&inner).await
    }

    pub async fn get_file(&self, file_id: &str) -> Option<FileRecord> {
        self.inner.lock().await.files.get(file_id).cloned()
    }

    pub async fn list_all_files(&self) -> Vec<FileRecord> {
        self.inner.lock().await.files.values().cloned().collect()
    }

    /// Scan every file's placements for one whose chunk id matches. Used when
    /// a caller only has an opaque chunk id and `parse_chunk_id` can't recover
    /// the owning file id from the id itself.
    pub async fn find_file_by_chunk_id(&self, chunk_id: &str) -> Option<FileRecord> {
        let inner = self.inner.lock().await;
        inner
            .files
            .values()
            .find(|f| f.placement_by_chunk_id(chunk_id).is_some())
            .cloned()
    }

    /// Locate the placement for `chunk_id` within `file_id`; create it at
    /// `chunk_index` if absent; append `node_id` to its replicas if not
    /// already present. If `file_id` is unknown, creates a minimal record.
    pub async fn update_chunk_replica(
        &self,
        file_id: &str,
        chunk_id: &ChunkId,
        chunk_index: u64,
        node_id: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .files
            .entry(file_id.to_string())
            .or_insert_with(|| FileRecord {
                file_id: file_id.to_string(),
                file_name: file_id.to_string(),
                file_size: 0,
                chunk_size: 0,
                placements: Vec::new(),
            });

        match record.placement_by_chunk_id_mut(chunk_id.as_str()) {
            Some(placement) => {
                placement.add_replica(node_id);
            }
            None => {
                let mut placement = ChunkPlacement::new(chunk_id.clone(), chunk_index);
                placement.add_replica(node_id);
                record.placements.push(placement);
            }
        }

        self.flush_locked(&inner).await
    }

    pub fn heartbeat_timeout(&self) -> f64 {
        self.heartbeat_timeout
    }
}

/// Read-only snapshot of a pending-instruction queue, used by admin listing.
/// The scheduler is the sole writer; the store exposes no mutation for it.
pub struct RebalanceQueue {
    inner: Mutex<Vec<RebalanceInstruction>>,
}

impl RebalanceQueue {
    pub fn new() -> Self {
        RebalanceQueue {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Replace the whole queue atomically (scheduler tick).
    pub async fn replace(&self, instructions: Vec<RebalanceInstruction>) {
        let mut inner = self.inner.lock().await;
        *inner = instructions;
    }

    /// Remove and return every instruction targeting `node_id`.
    pub async fn drain_for_target(&self, node_id: &str) -> Vec<RebalanceInstruction> {
        let mut inner = self.inner.lock().await;
        let (mine, rest): (Vec<_>, Vec<_>) = inner
            .drain(..)
            .partition(|i| i.target_node_id == node_id);
        *inner = rest;
        if !mine.is_empty() {
            debug!(node_id, count = mine.len(), "drained rebalance instructions");
        }
        mine
    }

    pub async fn snapshot(&self) -> Vec<RebalanceInstruction> {
        self.inner.lock().await.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

impl Default for RebalanceQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, free_bytes: u64, healthy: bool, last_seen: f64) -> NodeState {
        NodeState {
            node_id: id.to_string(),
            host: "h".into(),
            port: 1,
            capacity_bytes: 100,
            free_bytes,
            load_factor: 0.0,
            mac: String::new(),
            last_seen,
            healthy,
        }
    }

    #[tokio::test]
    async fn register_then_get() {
        let store = MetadataStore::new(15.0);
        store.register_node(node("n1", 80, true, 0.0)).await.unwrap();
        let got = store.get_node("n1").await.unwrap();
        assert_eq!(got.node_id, "n1");
        assert!(got.healthy);
    }

    #[tokio::test]
    async fn heartbeat_unknown_node_fails() {
        let store = MetadataStore::new(15.0);
        let err = store.update_heartbeat("ghost", 10, 0.0).await.unwrap_err();
        assert!(matches!(err, NimbusError::UnknownNode(_)));
    }

    #[tokio::test]
    async fn overdue_and_healthy_listing_agree() {
        let store = MetadataStore::new(0.01);
        store.register_node(node("n1", 80, true, 0.0)).await.unwrap();
        {
            let mut inner = store.inner.lock().await;
            inner.nodes.get_mut("n1").unwrap().last_seen = now_secs() - 1.0;
        }
        assert!(store.list_healthy_nodes().await.is_empty());
        let overdue = store.overdue_nodes().await;
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].node_id, "n1");
    }

    #[tokio::test]
    async fn delete_node_leaves_placements_untouched() {
        let store = MetadataStore::new(15.0);
        store.register_node(node("n1", 80, true, 0.0)).await.unwrap();
        let chunk_id = ChunkId::generate();
        store
            .update_chunk_replica("f1", &chunk_id, 0, "n1")
            .await
            .unwrap();

        assert!(store.delete_node("n1").await.unwrap());
        assert!(store.get_node("n1").await.is_none());

        let file = store.get_file("f1").await.unwrap();
        assert_eq!(file.placements[0].replicas, vec!["n1".to_string()]);
    }

    #[tokio::test]
    async fn update_chunk_replica_dedupes() {
        let store = MetadataStore::new(15.0);
        let chunk_id = ChunkId::generate();
        store
            .update_chunk_replica("f1", &chunk_id, 0, "n1")
            .await
            .unwrap();
        store
            .update_chunk_replica("f1", &chunk_id, 0, "n1")
            .await
            .unwrap();
        let file = store.get_file("f1").await.unwrap();
        assert_eq!(file.placements.len(), 1);
        assert_eq!(file.placements[0].replicas.len(), 1);
    }

    #[tokio::test]
    async fn rebalance_queue_drains_only_target() {
        let queue = RebalanceQueue::new();
        queue
            .replace(vec![
                RebalanceInstruction {
                    chunk_id: ChunkId::generate(),
                    source_node_id: "n2".into(),
                    target_node_id: "n1".into(),
                },
                RebalanceInstruction {
                    chunk_id: ChunkId::generate(),
                    source_node_id: "n1".into(),
                    target_node_id: "n3".into(),
                },
            ])
            .await;

        let drained = queue.drain_for_target("n1").await;
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].target_node_id, "n1");

        // Second drain for the same target returns nothing further.
        assert!(queue.drain_for_target("n1").await.is_empty());
        // n3's instruction is still pending.
        assert_eq!(queue.snapshot().await.len(), 1);
    }
}
