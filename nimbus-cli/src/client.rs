//! Thin HTTP client over the Master's admin surface.

use nimbus_protocol::{
    FileMetadataResponse, ListFilesResponse, ListNodesResponse, ListRebalancesResponse, OkResponse,
};

pub struct MasterClient {
    http: reqwest::Client,
    base_url: String,
}

impl MasterClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        MasterClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn list_nodes(&self) -> anyhow::Result<ListNodesResponse> {
        Ok(self.http.get(format!("{}/nodes", self.base_url)).send().await?.json().await?)
    }

    pub async fn fail_node(&self, node_id: &str) -> anyhow::Result<OkResponse> {
        Ok(self
            .http
            .post(format!("{}/nodes/{}/fail", self.base_url, node_id))
            .send()
            .await?
            .json()
            .await?)
    }

    pub async fn restore_node(&self, node_id: &str) -> anyhow::Result<OkResponse> {
        Ok(self
            .http
            .post(format!("{}/nodes/{}/restore", self.base_url, node_id))
            .send()
            .await?
            .json()
            .await?)
    }

    pub async fn delete_node(&self, node_id: &str) -> anyhow::Result<OkResponse> {
        Ok(self
            .http
            .delete(format!("{}/nodes/{}", self.base_url, node_id))
            .send()
            .await?
            .json()
            .await?)
    }

    pub async fn list_files(&self) -> anyhow::Result<ListFilesResponse> {
        Ok(self.http.get(format!("{}/files", self.base_url)).send().await?.json().await?)
    }

    pub async fn get_file(&self, file_id: &str) -> anyhow::Result<FileMetadataResponse> {
        Ok(self
            .http
            .get(format!("{}/files/{}", self.base_url, file_id))
            .send()
            .await?
            .json()
            .await?)
    }

    pub async fn list_rebalances(&self) -> anyhow::Result<ListRebalancesResponse> {
        Ok(self
            .http
            .get(format!("{}/rebalances", self.base_url))
            .send()
            .await?
            .json()
            .await?)
    }
}
