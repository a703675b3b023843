//! Incremental revision backup.
//!
//! Each dashboard keeps a watermark in `revision/<host>/<title>_<uid>/.meta_data`:
//! the highest version already copied. A run fetches only versions above it,
//! in ascending order, and then moves the watermark forward. The watermark
//! never decreases and every version at or below it is present in the folder.

use crate::grafana::{DashboardService, DashboardSummary};
use crate::naming;
use crate::orchestrator::meta::RevisionMeta;
use crate::store::BlobStore;
use crate::utils::{BackupError, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Watermark used when a dashboard has never been synced.
pub const DEFAULT_WATERMARK: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionOutcome {
    /// Watermark read at the start, `None` for a first sync
    pub previous: Option<u64>,
    /// Watermark written at the end
    pub watermark: u64,
    /// Versions copied in this run, ascending
    pub stored: Vec<u64>,
}

pub struct RevisionTracker<'a> {
    host: &'a str,
    service: &'a dyn DashboardService,
    store: &'a dyn BlobStore,
}

impl<'a> RevisionTracker<'a> {
    pub fn new(host: &'a str, service: &'a dyn DashboardService, store: &'a dyn BlobStore) -> Self {
        Self {
            host,
            service,
            store,
        }
    }

    /// Copy every version newer than the stored watermark.
    ///
    /// A failed version stops the sync for this dashboard. Versions copied
    /// before it are kept and the watermark only covers them, so the failed
    /// one is retried on the next run.
    pub async fn sync(&self, dashboard: &DashboardSummary) -> Result<RevisionOutcome> {
        let folder = naming::revision_folder(self.host, &dashboard.title, &dashboard.uid);
        let previous = read_watermark(self.store, &folder).await?;
        if previous.is_none() {
            info!(uid = %dashboard.uid, "Revision meta data is not present, syncing full history");
        }

        let mut versions: Vec<u64> = self
            .service
            .list_versions(dashboard.id)
            .await?
            .into_iter()
            .map(|v| v.version)
            .collect();
        versions.sort_unstable();
        versions.dedup();

        let mut watermark = previous.unwrap_or(DEFAULT_WATERMARK);
        let mut stored = Vec::new();
        let mut failure = None;

        for version in versions
            .into_iter()
            .filter(|v| previous.map_or(true, |w| *v > w))
        {
            match self.copy_version(dashboard, &folder, version).await {
                Ok(()) => {
                    stored.push(version);
                    watermark = watermark.max(version);
                }
                Err(e) => {
                    warn!(uid = %dashboard.uid, version, error = %e, "Failed to copy dashboard version");
                    failure = Some(e);
                    break;
                }
            }
        }

        // A first sync that copied nothing must not claim version 1.
        let claim_watermark = failure.is_none() || previous.is_some() || !stored.is_empty();
        if claim_watermark {
            write_watermark(self.store, &folder, watermark).await?;
        }

        if let Some(e) = failure {
            return Err(e);
        }

        debug!(uid = %dashboard.uid, ?previous, watermark, copied = stored.len(), "Revision sync done");
        Ok(RevisionOutcome {
            previous,
            watermark,
            stored,
        })
    }

    async fn copy_version(&self, dashboard: &DashboardSummary, folder: &str, version: u64) -> Result<()> {
        let details = self.service.version_details(dashboard.id, version).await?;
        let key = format!("{}{}", folder, naming::version_file_name(version));
        self.store.put(&key, &details).await
    }
}

/// Stored watermark for a revision folder. `Ok(None)` when no meta record exists.
pub async fn read_watermark(store: &dyn BlobStore, folder: &str) -> Result<Option<u64>> {
    let key = naming::meta_key(folder);
    match store.fetch(&key).await? {
        Some(value) => serde_json::from_value::<RevisionMeta>(value)
            .map(|meta| Some(meta.version))
            .map_err(|e| BackupError::store_read(key, e)),
        None => Ok(None),
    }
}

async fn write_watermark(store: &dyn BlobStore, folder: &str, version: u64) -> Result<()> {
    let meta: Value = serde_json::to_value(RevisionMeta { version })?;
    store.put(&naming::meta_key(folder), &meta).await
}
