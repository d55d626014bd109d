//! Storage backend trait
//!
//! Defines the interface every chunk storage implementation follows. The
//! chunk file layout on disk is an internal detail of each implementation,
//! never part of this contract.

use async_trait::async_trait;
use bytes::Bytes;
use nimbus_core::chunk::ChunkId;
use nimbus_core::error::Result;

/// Storage statistics for one agent's local store.
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    pub chunk_count: u64,
    pub bytes_used: u64,
    /// Total storage capacity (0 = unlimited / unknown).
    pub bytes_capacity: u64,
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
}

impl StorageStats {
    pub fn usage_percent(&self) -> f64 {
        if self.bytes_capacity == 0 {
            0.0
        } else {
            (self.bytes_used as f64 / self.bytes_capacity as f64) * 100.0
        }
    }

    pub fn is_full(&self) -> bool {
        self.bytes_capacity > 0 && self.bytes_used >= self.bytes_capacity
    }

    pub fn bytes_available(&self) -> u64 {
        if self.bytes_capacity == 0 {
            u64::MAX
        } else {
            self.bytes_capacity.saturating_sub(self.bytes_used)
        }
    }
}

/// Async storage backend trait. All implementations must be Send + Sync for
/// use from the agent's heartbeat and replication tasks concurrently.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn put(&self, id: &ChunkId, data: Bytes) -> Result<()>;

    async fn get(&self, id: &ChunkId) -> Result<Option<Bytes>>;

    async fn delete(&self, id: &ChunkId) -> Result<bool>;

    async fn exists(&self, id: &ChunkId) -> Result<bool>;

    async fn stats(&self) -> Result<StorageStats>;

    async fn list_chunks(&self) -> Result<Vec<ChunkId>>;
}
