//! Optional SQLite-backed durability snapshot.
//!
//! Every mutation triggers a full-rewrite snapshot under the store's mutation
//! lock — simplest-correct over incremental diffing, acceptable given the
//! in-memory state this mirrors is itself small.

use nimbus_core::error::{NimbusError, Result};
use nimbus_core::model::{ChunkPlacement, FileRecord, NodeState};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| NimbusError::Storage(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| NimbusError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS nodes (
                node_id TEXT PRIMARY KEY,
                host TEXT NOT NULL,
                port INTEGER NOT NULL,
                capacity INTEGER NOT NULL,
                free INTEGER NOT NULL,
                mac TEXT NOT NULL,
                last_seen REAL NOT NULL,
                healthy INTEGER NOT NULL,
                load_factor REAL NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| NimbusError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS files (
                file_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                size INTEGER NOT NULL,
                chunk_size INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| NimbusError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS placements (
                chunk_id TEXT PRIMARY KEY,
                file_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                replicas_json TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| NimbusError::Storage(e.to_string()))?;

        Ok(SnapshotStore { pool })
    }

    /// Full-rewrite save of the given in-memory state, within one transaction.
    pub async fn save(
        &self,
        nodes: &HashMap<String, NodeState>,
        files: &HashMap<String, FileRecord>,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| NimbusError::Storage(e.to_string()))?;

        sqlx::query("DELETE FROM nodes")
            .execute(&mut *tx)
            .await
            .map_err(|e| NimbusError::Storage(e.to_string()))?;
        for node in nodes.values() {
            sqlx::query(
                "INSERT INTO nodes (node_id, host, port, capacity, free, mac, last_seen, healthy, load_factor)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&node.node_id)
            .bind(&node.host)
            .bind(node.port as i64)
            .bind(node.capacity_bytes as i64)
            .bind(node.free_bytes as i64)
            .bind(&node.mac)
            .bind(node.last_seen)
            .bind(node.healthy)
            .bind(node.load_factor)
            .execute(&mut *tx)
            .await
            .map_err(|e| NimbusError::Storage(e.to_string()))?;
        }

        sqlx::query("DELETE FROM files").execute(&mut *tx).await.map_err(|e| NimbusError::Storage(e.to_string()))?;
        sqlx::query("DELETE FROM placements").execute(&mut *tx).await.map_err(|e| NimbusError::Storage(e.to_string()))?;
        for file in files.values() {
            sqlx::query("INSERT INTO files (file_id, name, size, chunk_size) VALUES (?, ?, ?, ?)")
                .bind(&file.file_id)
                .bind(&file.file_name)
                .bind(file.file_size as i64)
                .bind(file.chunk_size as i64)
                .execute(&mut *tx)
                .await
                .map_err(|e| NimbusError::Storage(e.to_string()))?;

            for placement in &file.placements {
                let replicas_json = serde_json::to_string(&placement.replicas)?;
                sqlx::query(
                    "INSERT INTO placements (chunk_id, file_id, chunk_index, replicas_json)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(placement.chunk_id.as_str())
                .bind(&file.file_id)
                .bind(placement.chunk_index as i64)
                .bind(replicas_json)
                .execute(&mut *tx)
                .await
                .map_err(|e| NimbusError::Storage(e.to_string()))?;
            }
        }

        tx.commit().await.map_err(|e| NimbusError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Rehydrate nodes and files from the snapshot. On a parse/read error,
    /// logs and returns empty collections (fail-open to availability).
    pub async fn load(&self) -> Result<(HashMap<String, NodeState>, HashMap<String, FileRecord>)> {
        match self.try_load().await {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(error = %e, "snapshot load failed, starting with empty state");
                Ok((HashMap::new(), HashMap::new()))
            }
        }
    }

    async fn try_load(&self) -> Result<(HashMap<String, NodeState>, HashMap<String, FileRecord>)> {
        use nimbus_core::chunk::ChunkId;

        let node_rows = sqlx::query_as::<_, (String, String, i64, i64, i64, String, f64, bool, f64)>(
            "SELECT node_id, host, port, capacity, free, mac, last_seen, healthy, load_factor FROM nodes",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| NimbusError::SnapshotCorrupted(e.to_string()))?;

        let mut nodes = HashMap::new();
        for (node_id, host, port, capacity, free, mac, last_seen, healthy, load_factor) in node_rows {
            nodes.insert(
                node_id.clone(),
                NodeState {
                    node_id,
                    host,
                    port: port as u16,
                    capacity_bytes: capacity as u64,
                    free_bytes: free as u64,
                    load_factor,
                    mac,
                    last_seen,
                    healthy,
                },
            );
        }

        let file_rows = sqlx::query_as::<_, (String, String, i64, i64)>(
            "SELECT file_id, name, size, chunk_size FROM files",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| NimbusError::SnapshotCorrupted(e.to_string()))?;

        let mut files = HashMap::new();
        for (file_id, name, size, chunk_size) in file_rows {
            files.insert(
                file_id.clone(),
                FileRecord {
                    file_id,
                    file_name: name,
                    file_size: size as u64,
                    chunk_size: chunk_size as u64,
                    placements: Vec::new(),
                },
            );
        }

        let placement_rows = sqlx::query_as::<_, (String, String, i64, String)>(
            "SELECT chunk_id, file_id, chunk_index, replicas_json FROM placements",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| NimbusError::SnapshotCorrupted(e.to_string()))?;

        for (chunk_id, file_id, chunk_index, replicas_json) in placement_rows {
            let replicas: Vec<String> = serde_json::from_str(&replicas_json)?;
            if let Some(file) = files.get_mut(&file_id) {
                file.placements.push(ChunkPlacement {
                    chunk_id: ChunkId::from_raw(chunk_id),
                    chunk_index: chunk_index as u64,
                    replicas,
                });
            }
        }
        for file in files.values_mut() {
            file.placements.sort_by_key(|p| p.chunk_index);
        }

        Ok((nodes, files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_nodes_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.db");

        let mut nodes = HashMap::new();
        nodes.insert(
            "n1".to_string(),
            NodeState {
                node_id: "n1".into(),
                host: "h".into(),
                port: 9000,
                capacity_bytes: 100,
                free_bytes: 80,
                load_factor: 0.0,
                mac: String::new(),
                last_seen: 123.0,
                healthy: true,
            },
        );
        let mut files = HashMap::new();
        files.insert(
            "f1".to_string(),
            FileRecord {
                file_id: "f1".into(),
                file_name: "f.bin".into(),
                file_size: 10,
                chunk_size: 4,
                placements: vec![ChunkPlacement {
                    chunk_id: nimbus_core::chunk::ChunkId::from_raw("c1"),
                    chunk_index: 0,
                    replicas: vec!["n1".into()],
                }],
            },
        );

        {
            let store = SnapshotStore::open(&path).await.unwrap();
            store.save(&nodes, &files).await.unwrap();
        }

        let reopened = SnapshotStore::open(&path).await.unwrap();
        let (loaded_nodes, loaded_files) = reopened.load().await.unwrap();
        assert_eq!(loaded_nodes.len(), 1);
        assert_eq!(loaded_nodes["n1"].host, "h");
        assert_eq!(loaded_files["f1"].placements[0].replicas, vec!["n1".to_string()]);
    }
}
