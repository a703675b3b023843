//! Per-host backup workflows.
//!
//! A [`HostOrchestrator`] drives one host through one [`Workflow`]:
//! - hourly / daily backup of every dashboard
//! - restore of stored dashboards onto the same host
//! - create (cross-server import) with folder remapping
//! - incremental revision backup
//!
//! Dashboards are processed one after another. A failure on one dashboard is
//! logged and counted as skipped; only a failed enumeration ends the host run.

pub mod filter;
pub mod meta;

use crate::grafana::{DashboardService, GrafanaClient};
use crate::naming;
use crate::revision::RevisionTracker;
use crate::scheduler::{HostJob, HostRunner};
use crate::store::{BlobStore, Store};
use crate::utils::{BackupError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub use filter::DashboardFilter;
pub use meta::{BackupKind, BatchMeta, RevisionMeta};

/// Where restore and create read stored dashboards from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSource {
    Hourly,
    /// One dated daily folder
    Daily(NaiveDate),
    /// Every dated daily folder of the host
    AllDaily,
}

impl RestoreSource {
    /// Parse `hourly`, `daily` or a `DD-MM-YYYY` date.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "hourly" => Ok(RestoreSource::Hourly),
            "daily" => Ok(RestoreSource::AllDaily),
            other => naming::parse_daily_date(other)
                .map(RestoreSource::Daily)
                .ok_or_else(|| {
                    BackupError::Config(format!(
                        "restore_from must be hourly, daily or DD-MM-YYYY, got {}",
                        value
                    ))
                }),
        }
    }

    fn prefix(&self, host: &str) -> String {
        match self {
            RestoreSource::Hourly => naming::hourly_folder(host),
            RestoreSource::Daily(date) => naming::daily_folder(host, *date),
            RestoreSource::AllDaily => naming::daily_root(),
        }
    }

    fn admits(&self, host: &str, key: &str) -> bool {
        match self {
            RestoreSource::AllDaily => naming::daily_key_host(key) == Some(host),
            _ => true,
        }
    }
}

impl std::fmt::Display for RestoreSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestoreSource::Hourly => f.write_str("hourly"),
            RestoreSource::Daily(date) => f.write_str(&naming::format_daily_date(*date)),
            RestoreSource::AllDaily => f.write_str("daily"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workflow {
    Backup(BackupKind),
    Restore {
        source: RestoreSource,
        filter: DashboardFilter,
    },
    Create {
        source: RestoreSource,
        filter: DashboardFilter,
    },
    Revision {
        filter: DashboardFilter,
    },
}

impl Workflow {
    pub fn name(&self) -> &'static str {
        match self {
            Workflow::Backup(BackupKind::Hourly) => "hourly-backup",
            Workflow::Backup(BackupKind::Daily) => "daily-backup",
            Workflow::Restore { .. } => "restore",
            Workflow::Create { .. } => "create",
            Workflow::Revision { .. } => "revision-backup",
        }
    }
}

/// Dashboards handled by one workflow run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowReport {
    pub processed: usize,
    pub skipped: usize,
}

impl WorkflowReport {
    fn record<T>(&mut self, what: &str, result: Result<T>) {
        match result {
            Ok(_) => self.processed += 1,
            Err(e) => {
                error!(item = %what, error = %e, "Skipping dashboard");
                self.skipped += 1;
            }
        }
    }

    /// Like `record`, for items that turn out not to be selected once loaded.
    fn record_selected(&mut self, what: &str, result: Result<bool>) {
        match result {
            Ok(false) => debug!(item = %what, "Dashboard not selected"),
            other => self.record(what, other),
        }
    }
}

pub struct HostOrchestrator {
    host: String,
    service: Arc<dyn DashboardService>,
    store: Arc<dyn BlobStore>,
}

impl HostOrchestrator {
    pub fn new(
        host: impl Into<String>,
        service: Arc<dyn DashboardService>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            host: host.into(),
            service,
            store,
        }
    }

    pub async fn run(&self, workflow: &Workflow) -> Result<WorkflowReport> {
        match workflow {
            Workflow::Backup(kind) => self.backup(*kind, &Local::now()).await,
            Workflow::Restore { source, filter } => self.restore(*source, filter).await,
            Workflow::Create { source, filter } => self.create(*source, filter).await,
            Workflow::Revision { filter } => self.revision_backup(filter).await,
        }
    }

    /// Snapshot every dashboard into the hourly or dated daily folder.
    pub async fn backup(&self, kind: BackupKind, now: &DateTime<Local>) -> Result<WorkflowReport> {
        let folder = match kind {
            BackupKind::Hourly => naming::hourly_folder(&self.host),
            BackupKind::Daily => naming::daily_folder(&self.host, now.date_naive()),
        };

        info!("Taking {} Grafana JSON backup for host {}", kind, self.host);
        let meta = serde_json::to_value(BatchMeta::new(kind, now))?;
        if let Err(e) = self.store.put(&naming::meta_key(&folder), &meta).await {
            error!(folder = %folder, error = %e, "Failed to write backup meta data");
        }

        match self.service.dashboard_tags().await {
            Ok(tags) => info!(host = %self.host, tags = tags.len(), "Dashboard tags on host"),
            Err(e) => warn!(host = %self.host, error = %e, "Could not list dashboard tags"),
        }

        let dashboards = self.service.search_dashboards().await?;
        if dashboards.is_empty() {
            warn!("Could not find any data for backup under {}", folder);
            return Ok(WorkflowReport::default());
        }
        info!("Scanned data for backup - {}", dashboards.len());

        let mut report = WorkflowReport::default();
        for dashboard in &dashboards {
            let key = format!(
                "{}{}",
                folder,
                naming::dashboard_file_name(&dashboard.title, &dashboard.uid)
            );
            let result = async {
                let details = self.service.dashboard_details(&dashboard.uid).await?;
                self.store.put(&key, &details).await
            }
            .await;
            report.record(&key, result);
        }

        Ok(report)
    }

    /// Push stored dashboards back with `overwrite = true`.
    pub async fn restore(&self, source: RestoreSource, filter: &DashboardFilter) -> Result<WorkflowReport> {
        info!("Restoring host {}, dashboards {:?}, from {}", self.host, filter, source);
        let keys = self.scan(source, filter, "restore").await?;

        let mut report = WorkflowReport::default();
        for key in keys {
            let result = async {
                let Some(document) = self.load_selected(&key, filter).await? else {
                    return Ok(false);
                };
                let document = prepare_restore(document, &key)?;
                self.service.push_dashboard(&document).await?;
                Ok::<_, BackupError>(true)
            }
            .await;
            report.record_selected(&key, result);
        }

        Ok(report)
    }

    /// Import stored dashboards as new dashboards, recreating folders as needed.
    pub async fn create(&self, source: RestoreSource, filter: &DashboardFilter) -> Result<WorkflowReport> {
        info!("Creating dashboards on host {}, dashboards {:?}, from {}", self.host, filter, source);
        let keys = self.scan(source, filter, "create").await?;

        let mut report = WorkflowReport::default();
        for key in keys {
            let result = async {
                let Some(document) = self.load_selected(&key, filter).await? else {
                    return Ok(false);
                };
                let folder_id = self.resolve_folder(&document).await?;
                let document = prepare_create(document, &key, folder_id)?;
                self.service.push_dashboard(&document).await?;
                Ok::<_, BackupError>(true)
            }
            .await;
            report.record_selected(&key, result);
        }

        Ok(report)
    }

    /// Copy new versions of every selected dashboard.
    pub async fn revision_backup(&self, filter: &DashboardFilter) -> Result<WorkflowReport> {
        info!("Taking revision backup of dashboards on host {}, dashboards {:?}", self.host, filter);

        let dashboards = self.service.search_dashboards().await?;
        if dashboards.is_empty() {
            warn!("Could not find any revision data for host {}", self.host);
            return Ok(WorkflowReport::default());
        }
        info!("Scanned data for revision - {}", dashboards.len());

        let tracker = RevisionTracker::new(&self.host, self.service.as_ref(), self.store.as_ref());
        let mut report = WorkflowReport::default();
        for dashboard in dashboards.iter().filter(|d| filter.matches_uid(&d.uid)) {
            let result = tracker.sync(dashboard).await;
            if let Ok(outcome) = &result {
                info!(
                    uid = %dashboard.uid,
                    copied = outcome.stored.len(),
                    watermark = outcome.watermark,
                    "Revision backup stored"
                );
            }
            report.record(&dashboard.uid, result);
        }

        Ok(report)
    }

    /// Stored keys for restore/create. An empty result is only a warning.
    async fn scan(&self, source: RestoreSource, filter: &DashboardFilter, purpose: &str) -> Result<Vec<String>> {
        let prefix = source.prefix(&self.host);
        let keys: Vec<String> = self
            .store
            .list(&prefix, naming::JSON_SUFFIX)
            .await?
            .into_iter()
            .filter(|key| source.admits(&self.host, key))
            .filter(|key| filter.matches_stem(naming::key_stem(key)))
            .collect();

        if keys.is_empty() {
            warn!("Could not find any data to {} under {}", purpose, prefix);
        } else {
            info!("Scanned candidates to {} - {:?}", purpose, keys);
        }
        Ok(keys)
    }

    /// Stored document for `key`, `None` when its uid was not requested.
    async fn load_selected(&self, key: &str, filter: &DashboardFilter) -> Result<Option<Value>> {
        let document = self.store.get(key).await?;
        Ok(filter
            .matches_stored(naming::key_stem(key), &document)
            .then_some(document))
    }

    /// Target folder id for a stored document: the same id when it still
    /// exists, a freshly created folder otherwise, 0 for the General folder.
    async fn resolve_folder(&self, document: &Value) -> Result<i64> {
        let folder_id = document
            .pointer("/meta/folderId")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if folder_id == 0 {
            return Ok(0);
        }

        if let Some(found) = self.service.search_folder(folder_id).await? {
            return Ok(found.id);
        }

        let title = document
            .pointer("/meta/folderTitle")
            .and_then(Value::as_str)
            .ok_or_else(|| BackupError::NotFound(format!("folderTitle for folder {}", folder_id)))?;
        let created = self.service.create_folder(title).await?;
        info!(folder_id, new_folder_id = created.id, title, "Created missing folder");
        Ok(created.id)
    }
}

fn restore_message(key: &str) -> String {
    format!("Updated by grafana backup script with content {}.", key)
}

fn prepare_restore(mut document: Value, key: &str) -> Result<Value> {
    let object = document
        .as_object_mut()
        .ok_or_else(|| BackupError::store_read(key, "stored document is not a JSON object"))?;
    object.insert("message".into(), json!(restore_message(key)));
    object.insert("overwrite".into(), json!(true));
    Ok(document)
}

fn prepare_create(mut document: Value, key: &str, folder_id: i64) -> Result<Value> {
    let dashboard = document
        .get_mut("dashboard")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| BackupError::store_read(key, "stored document has no dashboard object"))?;
    // Let the target server assign a fresh identity.
    dashboard.remove("uid");
    dashboard.remove("id");

    let mut document = prepare_restore(document, key)?;
    if let Some(object) = document.as_object_mut() {
        object.insert("folderId".into(), json!(folder_id));
    }
    Ok(document)
}

/// Runs jobs against live Grafana hosts and the run's storage backend.
pub struct GrafanaRunner {
    store: Arc<Store>,
}

impl GrafanaRunner {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HostRunner for GrafanaRunner {
    async fn run(&self, job: &HostJob) -> Result<WorkflowReport> {
        let service: Arc<dyn DashboardService> = Arc::new(GrafanaClient::for_host(&job.host));
        let store: Arc<dyn BlobStore> = self.store.clone();
        HostOrchestrator::new(job.host.name.clone(), service, store)
            .run(&job.workflow)
            .await
    }
}
