//! reqwest implementation of [`DashboardService`].

use super::{DashboardService, DashboardSummary, DashboardVersion, FolderRef};
use crate::config::HostConfig;
use crate::utils::{BackupError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

pub struct GrafanaClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Older servers return the history as a bare array, newer ones wrap it.
#[derive(Deserialize)]
#[serde(untagged)]
enum VersionList {
    Bare(Vec<DashboardVersion>),
    Wrapped { versions: Vec<DashboardVersion> },
}

impl GrafanaClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn for_host(host: &HostConfig) -> Self {
        Self::new(&host.url, &host.api_key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("Request to: {}", url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Ok(check_status(&url, resp).await?.json::<T>().await?)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.url(path);
        debug!("Request to: {}", url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        Ok(check_status(&url, resp).await?.json::<Value>().await?)
    }
}

async fn check_status(url: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    error!(
        "API call error, API: {}, status_code: {}, error: {}",
        url,
        status.as_u16(),
        body
    );
    Err(BackupError::RemoteApi {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl DashboardService for GrafanaClient {
    async fn search_dashboards(&self) -> Result<Vec<DashboardSummary>> {
        self.get_json("/api/search?type=dash-db").await
    }

    async fn dashboard_details(&self, uid: &str) -> Result<Value> {
        self.get_json(&format!("/api/dashboards/uid/{}", uid)).await
    }

    async fn list_versions(&self, dashboard_id: i64) -> Result<Vec<DashboardVersion>> {
        let list: VersionList = self
            .get_json(&format!("/api/dashboards/id/{}/versions", dashboard_id))
            .await?;
        Ok(match list {
            VersionList::Bare(versions) | VersionList::Wrapped { versions } => versions,
        })
    }

    async fn version_details(&self, dashboard_id: i64, version: u64) -> Result<Value> {
        self.get_json(&format!(
            "/api/dashboards/id/{}/versions/{}",
            dashboard_id, version
        ))
        .await
    }

    async fn search_folder(&self, folder_id: i64) -> Result<Option<FolderRef>> {
        let url = self.url(&format!("/api/folders/id/{}", folder_id));
        debug!("Request to: {}", url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if resp.status() != reqwest::StatusCode::OK {
            debug!(folder_id, status = resp.status().as_u16(), "Folder not found");
            return Ok(None);
        }
        Ok(Some(resp.json::<FolderRef>().await?))
    }

    async fn create_folder(&self, title: &str) -> Result<FolderRef> {
        let created = self.post_json("/api/folders", &json!({ "title": title })).await?;
        Ok(serde_json::from_value(created)?)
    }

    async fn push_dashboard(&self, document: &Value) -> Result<Value> {
        self.post_json("/api/dashboards/db", document).await
    }

    async fn dashboard_tags(&self) -> Result<Vec<Value>> {
        self.get_json("/api/dashboards/tags").await
    }
}
