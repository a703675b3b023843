//! Grafana HTTP API surface used by the backup workflows.

pub mod client;

use crate::utils::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use client::GrafanaClient;

/// One entry of `GET /api/search?type=dash-db`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub id: i64,
    pub uid: String,
    pub title: String,
}

/// One entry of a dashboard's version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardVersion {
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRef {
    pub id: i64,
}

#[async_trait]
pub trait DashboardService: Send + Sync {
    async fn search_dashboards(&self) -> Result<Vec<DashboardSummary>>;

    /// Full `{dashboard, meta}` document.
    async fn dashboard_details(&self, uid: &str) -> Result<Value>;

    async fn list_versions(&self, dashboard_id: i64) -> Result<Vec<DashboardVersion>>;

    async fn version_details(&self, dashboard_id: i64, version: u64) -> Result<Value>;

    /// `None` when the server does not answer 200 for this folder id.
    async fn search_folder(&self, folder_id: i64) -> Result<Option<FolderRef>>;

    async fn create_folder(&self, title: &str) -> Result<FolderRef>;

    /// Upsert a dashboard document.
    async fn push_dashboard(&self, document: &Value) -> Result<Value>;

    async fn dashboard_tags(&self) -> Result<Vec<Value>>;
}
