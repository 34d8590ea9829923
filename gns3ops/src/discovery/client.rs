//! Read-only client for the GNS3 server REST API.

use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;

use super::types::{Node, Project};
use crate::error::{DiscoveryError, Result};

/// GNS3 API client.
#[derive(Debug, Clone)]
pub struct Gns3Client {
    base_url: String,
    client: Client,
}

impl Gns3Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DiscoveryError::from)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/v2{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.api_url(path);
        debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(DiscoveryError::from)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(DiscoveryError::Api { status, body }.into());
        }

        Ok(resp.json().await.map_err(DiscoveryError::from)?)
    }

    pub async fn projects(&self) -> Result<Vec<Project>> {
        self.get("/projects").await
    }

    /// Look a project up by name.
    pub async fn project(&self, name: &str) -> Result<Project> {
        self.projects()
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| {
                DiscoveryError::ProjectNotFound {
                    name: name.to_string(),
                }
                .into()
            })
    }

    pub async fn nodes(&self, project_id: &str) -> Result<Vec<Node>> {
        self.get(&format!("/projects/{}/nodes", project_id)).await
    }
}
