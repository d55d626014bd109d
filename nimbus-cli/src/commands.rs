//! Subcommand handlers: table-formatted output, non-zero exit with the
//! server's `reason` on failure.

use crate::client::MasterClient;

pub async fn nodes_list(client: &MasterClient) -> anyhow::Result<()> {
    let resp = client.list_nodes().await?;
    println!("{:<16} {:<16} {:>6} {:>12} {:>12} {:>8} {:<8}", "NODE_ID", "HOST", "PORT", "CAPACITY", "FREE", "LOAD", "HEALTHY");
    for n in resp.nodes {
        println!(
            "{:<16} {:<16} {:>6} {:>12} {:>12} {:>8.2} {:<8}",
            n.node_id, n.host, n.grpc_port, n.capacity_bytes, n.free_bytes, n.load_factor, n.healthy
        );
    }
    Ok(())
}

pub async fn nodes_fail(client: &MasterClient, node_id: &str) -> anyhow::Result<()> {
    report(client.fail_node(node_id).await?)
}

pub async fn nodes_restore(client: &MasterClient, node_id: &str) -> anyhow::Result<()> {
    report(client.restore_node(node_id).await?)
}

pub async fn nodes_delete(client: &MasterClient, node_id: &str) -> anyhow::Result<()> {
    report(client.delete_node(node_id).await?)
}

pub async fn files_list(client: &MasterClient) -> anyhow::Result<()> {
    let resp = client.list_files().await?;
    println!("{:<20} {:<20} {:>12} {:>10} {:>10}", "FILE_ID", "NAME", "SIZE", "CHUNK_SIZE", "CHUNKS");
    for f in resp.files {
        println!("{:<20} {:<20} {:>12} {:>10} {:>10}", f.file_id, f.file_name, f.file_size, f.chunk_size, f.placements.len());
    }
    Ok(())
}

pub async fn files_show(client: &MasterClient, file_id: &str) -> anyhow::Result<()> {
    let f = client.get_file(file_id).await?;
    println!("file_id:    {}", f.file_id);
    println!("file_name:  {}", f.file_name);
    println!("file_size:  {}", f.file_size);
    println!("chunk_size: {}", f.chunk_size);
    println!("{:<36} {:>6} {:<40}", "CHUNK_ID", "INDEX", "REPLICAS");
    for p in f.placements {
        let replicas: Vec<String> = p.replicas.iter().map(|r| r.node_id.clone()).collect();
        println!("{:<36} {:>6} {:<40}", p.chunk_id, p.chunk_index, replicas.join(","));
    }
    Ok(())
}

pub async fn rebalances_list(client: &MasterClient) -> anyhow::Result<()> {
    let resp = client.list_rebalances().await?;
    println!("{:<36} {:<16} {:<16}", "CHUNK_ID", "SOURCE", "TARGET");
    for r in resp.rebalances {
        println!("{:<36} {:<16} {:<16}", r.chunk_id, r.source_node_id, r.target_node_id);
    }
    Ok(())
}

fn report(resp: nimbus_protocol::OkResponse) -> anyhow::Result<()> {
    if resp.ok {
        println!("ok");
        Ok(())
    } else {
        anyhow::bail!(resp.reason.unwrap_or_else(|| "unknown error".to_string()))
    }
}
