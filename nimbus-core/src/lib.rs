//! Nimbus Core Library
//!
//! Shared domain types for the Nimbus distributed storage control plane:
//! - Opaque chunk identifiers
//! - Metadata Store domain models (nodes, files, placements, rebalance instructions)
//! - A unified error taxonomy

pub mod chunk;
pub mod error;
pub mod model;

pub use chunk::ChunkId;
pub use error::{NimbusError, Result};
pub use model::{ChunkPlacement, FileRecord, NodeDescriptor, NodeState, RebalanceInstruction};

/// Default chunk size: 4 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Default replication factor.
pub const DEFAULT_REPLICATION_FACTOR: usize = 3;
