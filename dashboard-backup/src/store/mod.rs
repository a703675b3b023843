//! Blob storage for dashboard snapshots.
//!
//! Keys are logical `/`-joined paths produced by [`crate::naming`]. Each
//! backend maps them onto its own root (a directory or a bucket prefix).
//! Exactly one [`Store`] is resolved per run from the roster's backup section.

pub mod fs;
pub mod object;

use crate::config::BackupConfig;
use crate::naming::META_SENTINEL;
use crate::utils::{BackupError, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

pub use fs::FsStore;
pub use object::ObjectBackend;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a JSON document, replacing anything already at `key`.
    async fn put(&self, key: &str, value: &Value) -> Result<()>;

    /// Read a JSON document. `Ok(None)` means nothing is stored at `key`.
    async fn fetch(&self, key: &str) -> Result<Option<Value>>;

    /// Keys under `prefix` ending in `suffix`, sorted, meta records excluded.
    async fn list(&self, prefix: &str, suffix: &str) -> Result<Vec<String>>;

    /// Read a JSON document that must exist.
    async fn get(&self, key: &str) -> Result<Value> {
        self.fetch(key)
            .await?
            .ok_or_else(|| BackupError::NotFound(key.to_string()))
    }
}

/// The storage backend selected for this run.
pub enum Store {
    Filesystem(FsStore),
    Object(ObjectBackend),
    /// Object storage is authoritative; every write is copied to disk as well.
    Mirrored {
        primary: ObjectBackend,
        mirror: FsStore,
    },
}

impl Store {
    /// Resolve the backend from configuration. Object storage wins over local.
    pub fn from_config(config: &BackupConfig) -> Result<Self> {
        let local = config.local.enabled.then(|| FsStore::new(&config.local.backup_folder));
        if local.is_some() {
            info!(
                "Local backup is enabled and storing under: {:?}",
                config.local.backup_folder
            );
        }

        if !config.s3.enabled {
            return local
                .map(Store::Filesystem)
                .ok_or_else(|| BackupError::Config("no storage backend enabled".into()));
        }

        let object = ObjectBackend::from_config(&config.s3)?;
        info!(
            bucket = %object.bucket(),
            prefix = %object.prefix(),
            "S3 backup is enabled"
        );

        Ok(match local {
            Some(mirror) => {
                warn!("Both local and s3 backup are enabled; s3 is read, both are written");
                Store::Mirrored {
                    primary: object,
                    mirror,
                }
            }
            None => Store::Object(object),
        })
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Store::Filesystem(_) => "filesystem",
            Store::Object(_) => "object",
            Store::Mirrored { .. } => "object+filesystem",
        }
    }
}

#[async_trait]
impl BlobStore for Store {
    async fn put(&self, key: &str, value: &Value) -> Result<()> {
        match self {
            Store::Filesystem(fs) => fs.put(key, value).await,
            Store::Object(object) => object.put(key, value).await,
            Store::Mirrored { primary, mirror } => {
                let result = primary.put(key, value).await;
                if let Err(e) = mirror.put(key, value).await {
                    warn!(key, error = %e, "Local mirror write failed");
                }
                result
            }
        }
    }

    async fn fetch(&self, key: &str) -> Result<Option<Value>> {
        match self {
            Store::Filesystem(fs) => fs.fetch(key).await,
            Store::Object(object) | Store::Mirrored { primary: object, .. } => {
                object.fetch(key).await
            }
        }
    }

    async fn list(&self, prefix: &str, suffix: &str) -> Result<Vec<String>> {
        match self {
            Store::Filesystem(fs) => fs.list(prefix, suffix).await,
            Store::Object(object) | Store::Mirrored { primary: object, .. } => {
                object.list(prefix, suffix).await
            }
        }
    }
}

/// Shared listing rule: suffix match and meta records never count as content.
pub(crate) fn is_listed(key: &str, suffix: &str) -> bool {
    !key.ends_with(META_SENTINEL) && key.ends_with(suffix)
}
