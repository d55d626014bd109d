//! Nimbus admin CLI
//!
//! Talks to the Master's admin HTTP surface.

use clap::{Parser, Subcommand};

mod client;
mod commands;

use client::MasterClient;

#[derive(Parser)]
#[command(name = "nimbus")]
#[command(about = "Nimbus admin CLI")]
#[command(version)]
struct Cli {
    /// Master base URL.
    #[arg(long, env = "NIMBUS_MASTER_URL", default_value = "http://127.0.0.1:7700")]
    master_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Node administration
    Nodes {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// File metadata inspection
    Files {
        #[command(subcommand)]
        action: FileAction,
    },
    /// Pending rebalance instructions
    Rebalances {
        #[command(subcommand)]
        action: RebalanceAction,
    },
}

#[derive(Subcommand)]
enum NodeAction {
    List,
    Fail { node_id: String },
    Restore { node_id: String },
    Delete { node_id: String },
}

#[derive(Subcommand)]
enum FileAction {
    List,
    Show { file_id: String },
}

#[derive(Subcommand)]
enum RebalanceAction {
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).init();

    let cli = Cli::parse();
    let client = MasterClient::new(cli.master_url);

    let result = match cli.command {
        Commands::Nodes { action } => match action {
            NodeAction::List => commands::nodes_list(&client).await,
            NodeAction::Fail { node_id } => commands::nodes_fail(&client, &node_id).await,
            NodeAction::Restore { node_id } => commands::nodes_restore(&client, &node_id).await,
            NodeAction::Delete { node_id } => commands::nodes_delete(&client, &node_id).await,
        },
        Commands::Files { action } => match action {
            FileAction::List => commands::files_list(&client).await,
            FileAction::Show { file_id } => commands::files_show(&client, &file_id).await,
        },
        Commands::Rebalances { action } => match action {
            RebalanceAction::List => commands::rebalances_list(&client).await,
        },
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    Ok(())
}
