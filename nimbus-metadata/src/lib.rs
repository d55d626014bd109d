//! Nimbus Metadata Service
//!
//! Owns the in-memory source of truth for node and file state, with an
//! optional SQLite snapshot for crash recovery, plus the two background
//! tasks that keep placement healthy over time: the Liveness Monitor and the
//! Rebalance Scheduler.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                       MetadataStore                            │
//! │   nodes, files (in-memory) ── optional SQLite snapshot         │
//! └───────────────────────────────────────────────────────────────┘
//!            │                    │                   │
//!     ┌──────────────┐    ┌───────────────┐   ┌────────────────┐
//! │   planner    │    │   liveness    │   │   scheduler     │
//! │ (pure plan)  │    │ (background)  │   │  (background)   │
//! └──────────────┘    └───────────────┘   └─────────────────┘
//! ```

pub mod liveness;
pub mod planner;
pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use liveness::spawn as spawn_liveness_monitor;
pub use planner::plan_upload;
pub use scheduler::{plan_rebalances, spawn as spawn_rebalance_scheduler, Rebalance, SchedulerConfig};
pub use snapshot::SnapshotStore;
pub use store::{MetadataStore, RebalanceQueue};
