//! Nimbus Storage Agent
//!
//! Registers with the Master, heartbeats on an interval, executes rebalance
//! instructions pulled from heartbeat replies, and serves chunk bytes to
//! peer agents over HTTP.

pub mod chunk_server;
pub mod config;
pub mod control_loop;

pub use config::AgentConfig;
pub use control_loop::AgentState;
