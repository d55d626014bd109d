//! Filesystem-backed chunk storage: one file per chunk, tracked used bytes,
//! periodic disk-stat sampling, all behind [`StorageBackend`] so callers never
//! need to know the on-disk layout.

use crate::backend::{StorageBackend, StorageStats};
use async_trait::async_trait;
use bytes::Bytes;
use nimbus_core::chunk::ChunkId;
use nimbus_core::error::{NimbusError, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use sysinfo::Disks;
use tokio::fs;

/// Stores each chunk as a single flat file under `data_dir`, named by chunk id.
pub struct FilesystemBackend {
    data_dir: PathBuf,
    capacity_override: u64,
    bytes_used: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl FilesystemBackend {
    /// Open (creating if needed) a chunk store rooted at `data_dir`. Scans
    /// existing chunk files to seed `bytes_used`, mirroring the source
    /// system's `_scan_used_bytes` startup behavior.
    pub async fn open(data_dir: impl Into<PathBuf>, capacity_override: u64) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).await?;

        let mut bytes_used = 0u64;
        let mut entries = fs::read_dir(&data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Ok(meta) = entry.metadata().await {
                if meta.is_file() {
                    bytes_used += meta.len();
                }
            }
        }

        Ok(FilesystemBackend {
            data_dir,
            capacity_override,
            bytes_used: AtomicU64::new(bytes_used),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        })
    }

    fn chunk_path(&self, id: &ChunkId) -> PathBuf {
        self.data_dir.join(id.as_str())
    }

    /// `(total, free)` bytes, preferring the configured override over a live
    /// filesystem sample.
    fn disk_stats(&self) -> (u64, u64) {
        if self.capacity_override > 0 {
            let used = self.bytes_used.load(Ordering::SeqCst);
            return (
                self.capacity_override,
                self.capacity_override.saturating_sub(used),
            );
        }
        sample_host_disk(&self.data_dir)
    }
}

fn sample_host_disk(path: &Path) -> (u64, u64) {
    let disks = Disks::new_with_refreshed_list();
    let mut best: Option<(&Path, u64, u64)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if path.starts_with(mount) {
            let is_better = match best {
                Some((best_mount, _, _)) => mount.as_os_str().len() > best_mount.as_os_str().len(),
                None => true,
            };
            if is_better {
                best = Some((mount, disk.total_space(), disk.available_space()));
            }
        }
    }
    match best {
        Some((_, total, free)) => (total, free),
        None => (0, 0),
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn put(&self, id: &ChunkId, data: Bytes) -> Result<()> {
        let path = self.chunk_path(id);
        let new_len = data.len() as u64;

        let old_len = match fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(NimbusError::Io(e)),
        };

        fs::write(&path, &data).await?;

        self.bytes_used.fetch_sub(old_len, Ordering::SeqCst);
        self.bytes_used.fetch_add(new_len, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn get(&self, id: &ChunkId) -> Result<Option<Bytes>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        match fs::read(self.chunk_path(id)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NimbusError::Io(e)),
        }
    }

    async fn delete(&self, id: &ChunkId) -> Result<bool> {
        let path = self.chunk_path(id);
        match fs::metadata(&path).await {
            Ok(meta) => {
                let len = meta.len();
                fs::remove_file(&path).await?;
                self.bytes_used.fetch_sub(len, Ordering::SeqCst);
                self.deletes.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(NimbusError::Io(e)),
        }
    }

    async fn exists(&self, id: &ChunkId) -> Result<bool> {
        Ok(fs::metadata(self.chunk_path(id)).await.is_ok())
    }

    async fn stats(&self) -> Result<StorageStats> {
        let (total, _free) = self.disk_stats();
        let mut chunk_count = 0u64;
        let mut entries = fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.metadata().await.map(|m| m.is_file()).unwrap_or(false) {
                chunk_count += 1;
            }
        }

        Ok(StorageStats {
            chunk_count,
            bytes_used: self.bytes_used.load(Ordering::SeqCst),
            bytes_capacity: total,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        })
    }

    async fn list_chunks(&self) -> Result<Vec<ChunkId>> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.metadata().await.map(|m| m.is_file()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(ChunkId::from_raw(name.to_string()));
                }
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::open(dir.path(), 0).await.unwrap();
        let id = ChunkId::generate();
        let data = Bytes::from_static(b"hello chunk");

        backend.put(&id, data.clone()).await.unwrap();
        assert!(backend.exists(&id).await.unwrap());
        assert_eq!(backend.get(&id).await.unwrap(), Some(data));

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.chunk_count, 1);
        assert_eq!(stats.bytes_used, 11);

        assert!(backend.delete(&id).await.unwrap());
        assert!(!backend.exists(&id).await.unwrap());
        assert_eq!(backend.stats().await.unwrap().bytes_used, 0);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::open(dir.path(), 0).await.unwrap();
        assert_eq!(backend.get(&ChunkId::generate()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn capacity_override_reported_in_stats() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::open(dir.path(), 1000).await.unwrap();
        backend
            .put(&ChunkId::generate(), Bytes::from(vec![0u8; 100]))
            .await
            .unwrap();
        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.bytes_capacity, 1000);
        assert_eq!(stats.bytes_used, 100);
    }

    #[tokio::test]
    async fn reopen_rescans_existing_bytes() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = FilesystemBackend::open(dir.path(), 0).await.unwrap();
            backend
                .put(&ChunkId::generate(), Bytes::from(vec![0u8; 42]))
                .await
                .unwrap();
        }
        let reopened = FilesystemBackend::open(dir.path(), 0).await.unwrap();
        assert_eq!(reopened.stats().await.unwrap().bytes_used, 42);
    }
}
