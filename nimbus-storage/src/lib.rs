//! Nimbus Storage Backend
//!
//! Provides the [`StorageBackend`] trait that hides how a storage agent
//! actually persists chunk bytes, plus a filesystem-backed implementation
//! and an in-memory one for tests.

pub mod backend;
pub mod filesystem;
pub mod memory;

pub use backend::{StorageBackend, StorageStats};
pub use filesystem::FilesystemBackend;
pub use memory::MemoryBackend;

/// Storage configuration for a filesystem-backed agent.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory under which chunk files are written.
    pub data_dir: std::path::PathBuf,

    /// Capacity override in bytes (0 = sample the host filesystem instead).
    pub capacity_override: u64,
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<std::path::PathBuf>) -> Self {
        StorageConfig {
            data_dir: data_dir.into(),
            capacity_override: 0,
        }
    }

    pub fn with_capacity_override(mut self, bytes: u64) -> Self {
        self.capacity_override = bytes;
        self
    }
}
