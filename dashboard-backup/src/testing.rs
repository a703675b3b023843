//! In-memory Grafana used by the workflow tests.

use crate::grafana::{DashboardService, DashboardSummary, DashboardVersion, FolderRef};
use crate::utils::{BackupError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct FakeState {
    dashboards: Vec<DashboardSummary>,
    versions: HashMap<i64, Vec<u64>>,
    folders: BTreeMap<i64, String>,
    next_folder_id: i64,
    pushed: Vec<Value>,
    created_folders: Vec<String>,
    version_fetches: Vec<(i64, u64)>,
    search_error: Option<u16>,
    tags_error: bool,
    broken_details: HashSet<String>,
    broken_versions: HashSet<(i64, u64)>,
}

#[derive(Default)]
pub struct FakeGrafana {
    state: Mutex<FakeState>,
}

impl FakeGrafana {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().next_folder_id = 100;
        fake
    }

    pub fn with_dashboard(self, id: i64, uid: &str, title: &str) -> Self {
        self.state.lock().unwrap().dashboards.push(DashboardSummary {
            id,
            uid: uid.to_string(),
            title: title.to_string(),
        });
        self
    }

    pub fn with_versions(self, id: i64, versions: &[u64]) -> Self {
        self.set_versions(id, versions);
        self
    }

    pub fn with_folder(self, id: i64, title: &str) -> Self {
        self.state.lock().unwrap().folders.insert(id, title.to_string());
        self
    }

    pub fn failing_search(self, status: u16) -> Self {
        self.state.lock().unwrap().search_error = Some(status);
        self
    }

    pub fn failing_tags(self) -> Self {
        self.state.lock().unwrap().tags_error = true;
        self
    }

    pub fn failing_details(self, uid: &str) -> Self {
        self.state.lock().unwrap().broken_details.insert(uid.to_string());
        self
    }

    pub fn failing_version(self, id: i64, version: u64) -> Self {
        self.state.lock().unwrap().broken_versions.insert((id, version));
        self
    }

    pub fn set_versions(&self, id: i64, versions: &[u64]) {
        self.state.lock().unwrap().versions.insert(id, versions.to_vec());
    }

    pub fn heal_version(&self, id: i64, version: u64) {
        self.state.lock().unwrap().broken_versions.remove(&(id, version));
    }

    pub fn pushed(&self) -> Vec<Value> {
        self.state.lock().unwrap().pushed.clone()
    }

    pub fn created_folders(&self) -> Vec<String> {
        self.state.lock().unwrap().created_folders.clone()
    }

    pub fn version_fetches(&self) -> Vec<(i64, u64)> {
        self.state.lock().unwrap().version_fetches.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.lock().unwrap();
        state.pushed.clear();
        state.version_fetches.clear();
    }
}

fn not_found(what: String) -> BackupError {
    BackupError::RemoteApi {
        status: 404,
        body: what,
    }
}

#[async_trait]
impl DashboardService for FakeGrafana {
    async fn search_dashboards(&self) -> Result<Vec<DashboardSummary>> {
        let state = self.state.lock().unwrap();
        match state.search_error {
            Some(status) => Err(BackupError::RemoteApi {
                status,
                body: "search failed".into(),
            }),
            None => Ok(state.dashboards.clone()),
        }
    }

    async fn dashboard_details(&self, uid: &str) -> Result<Value> {
        let state = self.state.lock().unwrap();
        if state.broken_details.contains(uid) {
            return Err(BackupError::RemoteApi {
                status: 500,
                body: "boom".into(),
            });
        }
        let summary = state
            .dashboards
            .iter()
            .find(|d| d.uid == uid)
            .ok_or_else(|| not_found(format!("dashboard {}", uid)))?;

        Ok(json!({
            "dashboard": {"id": summary.id, "uid": summary.uid, "title": summary.title, "panels": []},
            "meta": {"folderId": 0, "folderTitle": "General", "slug": summary.title.to_lowercase()}
        }))
    }

    async fn list_versions(&self, dashboard_id: i64) -> Result<Vec<DashboardVersion>> {
        let state = self.state.lock().unwrap();
        let versions = state
            .versions
            .get(&dashboard_id)
            .ok_or_else(|| not_found(format!("dashboard id {}", dashboard_id)))?;
        // Newest first, like the real API.
        Ok(versions
            .iter()
            .rev()
            .map(|&version| DashboardVersion { version })
            .collect())
    }

    async fn version_details(&self, dashboard_id: i64, version: u64) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        state.version_fetches.push((dashboard_id, version));
        if state.broken_versions.contains(&(dashboard_id, version)) {
            return Err(BackupError::RemoteApi {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        Ok(json!({"dashboardId": dashboard_id, "version": version, "data": {"title": "v"}}))
    }

    async fn search_folder(&self, folder_id: i64) -> Result<Option<FolderRef>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .folders
            .contains_key(&folder_id)
            .then_some(FolderRef { id: folder_id }))
    }

    async fn create_folder(&self, title: &str) -> Result<FolderRef> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_folder_id;
        state.next_folder_id += 1;
        state.folders.insert(id, title.to_string());
        state.created_folders.push(title.to_string());
        Ok(FolderRef { id })
    }

    async fn push_dashboard(&self, document: &Value) -> Result<Value> {
        self.state.lock().unwrap().pushed.push(document.clone());
        Ok(json!({"status": "success"}))
    }

    async fn dashboard_tags(&self) -> Result<Vec<Value>> {
        if self.state.lock().unwrap().tags_error {
            return Err(BackupError::RemoteApi {
                status: 403,
                body: "forbidden".into(),
            });
        }
        Ok(vec![json!({"term": "infra", "count": 1})])
    }
}
