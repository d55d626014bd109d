//! Storage agent configuration, loaded via `clap` derive + `env`.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "nimbus-agent")]
#[command(about = "Nimbus storage agent: register, heartbeat, replicate")]
pub struct AgentConfig {
    /// Stable identity for this node. Generated if absent (dev convenience).
    #[arg(long, env = "NIMBUS_NODE_ID")]
    pub node_id: Option<String>,

    /// Host this agent advertises to the Master for peer chunk transfer.
    #[arg(long, env = "NIMBUS_PUBLIC_HOST", default_value = "127.0.0.1")]
    pub public_host: String,

    /// Port this agent's chunk-serving HTTP listener binds.
    #[arg(long, env = "NIMBUS_AGENT_PORT", default_value_t = 7800)]
    pub port: u16,

    #[arg(long, env = "NIMBUS_AGENT_MASTER_HOST", default_value = "127.0.0.1")]
    pub master_host: String,

    #[arg(long, env = "NIMBUS_AGENT_MASTER_PORT", default_value_t = 7700)]
    pub master_port: u16,

    /// Directory chunk bytes are persisted under.
    #[arg(long, env = "NIMBUS_DATA_DIR", default_value = "./nimbus-data")]
    pub data_dir: String,

    /// Capacity override in bytes. 0 samples the host filesystem instead.
    #[arg(long, env = "NIMBUS_CAPACITY_BYTES", default_value_t = 0)]
    pub capacity_bytes: u64,

    #[arg(long, env = "NIMBUS_HEARTBEAT_INTERVAL", default_value_t = 5)]
    pub heartbeat_interval_secs: u64,

    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

impl AgentConfig {
    pub fn master_base_url(&self) -> String {
        format!("http://{}:{}", self.master_host, self.master_port)
    }

    pub fn resolved_node_id(&self) -> String {
        self.node_id
            .clone()
            .unwrap_or_else(|| format!("node-{}", nimbus_core::chunk::ChunkId::generate().as_str()))
    }
}
