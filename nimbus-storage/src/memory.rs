//! In-memory storage backend.
//!
//! Used as a test double for the agent's replication logic; not persistent.

use crate::backend::{StorageBackend, StorageStats};
use async_trait::async_trait;
use bytes::Bytes;
use nimbus_core::chunk::ChunkId;
use nimbus_core::error::{NimbusError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

pub struct MemoryBackend {
    chunks: RwLock<HashMap<ChunkId, Bytes>>,
    max_capacity: u64,
    bytes_used: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(max_bytes: u64) -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            max_capacity: max_bytes,
            bytes_used: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put(&self, id: &ChunkId, data: Bytes) -> Result<()> {
        let data_len = data.len() as u64;
        if self.max_capacity > 0 {
            let current = self.bytes_used.load(Ordering::SeqCst);
            if current + data_len > self.max_capacity {
                return Err(NimbusError::Storage(format!(
                    "storage full: {current}/{} bytes",
                    self.max_capacity
                )));
            }
        }

        let mut chunks = self.chunks.write().await;
        if let Some(old) = chunks.get(id) {
            self.bytes_used.fetch_sub(old.len() as u64, Ordering::SeqCst);
        }
        chunks.insert(id.clone(), data);
        self.bytes_used.fetch_add(data_len, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn get(&self, id: &ChunkId) -> Result<Option<Bytes>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.chunks.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &ChunkId) -> Result<bool> {
        let mut chunks = self.chunks.write().await;
        if let Some(old) = chunks.remove(id) {
            self.bytes_used.fetch_sub(old.len() as u64, Ordering::SeqCst);
            self.deletes.fetch_add(1, Ordering::Relaxed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn exists(&self, id: &ChunkId) -> Result<bool> {
        Ok(self.chunks.read().await.contains_key(id))
    }

    async fn stats(&self) -> Result<StorageStats> {
        let chunks = self.chunks.read().await;
        Ok(StorageStats {
            chunk_count: chunks.len() as u64,
            bytes_used: self.bytes_used.load(Ordering::SeqCst),
            bytes_capacity: self.max_capacity,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        })
    }

    async fn list_chunks(&self) -> Result<Vec<ChunkId>> {
        Ok(self.chunks.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_round_trip() {
        let backend = MemoryBackend::new();
        let id = ChunkId::generate();
        let data = Bytes::from_static(b"hello world");

        backend.put(&id, data.clone()).await.unwrap();
        assert_eq!(backend.get(&id).await.unwrap(), Some(data));
    }

    #[tokio::test]
    async fn capacity_limit_rejects_overflow() {
        let backend = MemoryBackend::with_capacity(100);
        backend
            .put(&ChunkId::generate(), Bytes::from(vec![0u8; 50]))
            .await
            .unwrap();
        backend
            .put(&ChunkId::generate(), Bytes::from(vec![0u8; 50]))
            .await
            .unwrap();
        let result = backend
            .put(&ChunkId::generate(), Bytes::from(vec![0u8; 1]))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stats_reflect_usage() {
        let backend = MemoryBackend::with_capacity(1000);
        let id = ChunkId::generate();
        backend
            .put(&id, Bytes::from(vec![0u8; 100]))
            .await
            .unwrap();
        backend.get(&id).await.unwrap();
        backend.get(&id).await.unwrap();

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.chunk_count, 1);
        assert_eq!(stats.bytes_used, 100);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.reads, 2);
        assert_eq!(stats.usage_percent(), 10.0);
    }
}
