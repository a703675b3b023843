//! S3-compatible object storage backend.

use super::{is_listed, BlobStore};
use crate::config::S3BackupConfig;
use crate::utils::{BackupError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ObjectBackend {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    /// Key prefix, always empty or ending in `/`
    prefix: String,
}

impl ObjectBackend {
    /// Build an S3 backend. Credentials come from the standard AWS environment.
    pub fn from_config(config: &S3BackupConfig) -> Result<Self> {
        let bucket = config
            .bucket_name
            .clone()
            .ok_or_else(|| BackupError::Config("s3 bucket_name is missing".into()))?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&bucket);
        if let Some(ref region) = config.region {
            builder = builder.with_region(region);
        }
        if let Some(ref endpoint) = config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        let store = builder
            .build()
            .map_err(|e| BackupError::Config(format!("cannot build s3 client: {}", e)))?;

        Ok(Self::with_store(Arc::new(store), &bucket, &config.backup_folder))
    }

    /// Wrap an existing object store, e.g. an in-memory one.
    pub fn with_store(store: Arc<dyn ObjectStore>, bucket: &str, prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        };

        Self {
            store,
            bucket: bucket.to_string(),
            prefix,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn build_path(&self, key: &str) -> Result<ObjectPath> {
        let full_key = format!("{}{}", self.prefix, key.trim_start_matches('/'));
        ObjectPath::parse(&full_key).map_err(|e| BackupError::Config(format!("invalid key {}: {}", key, e)))
    }
}

#[async_trait]
impl BlobStore for ObjectBackend {
    async fn put(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.build_path(key)?;
        let body = serde_json::to_vec(value)?;

        info!("Storing data: {}/{}", self.bucket, path);
        self.store
            .put(&path, Bytes::from(body).into())
            .await
            .map_err(|e| BackupError::store_write(key, e))?;
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Option<Value>> {
        let path = self.build_path(key)?;

        let data = match self.store.get(&path).await {
            Ok(result) => result
                .bytes()
                .await
                .map_err(|e| BackupError::store_read(key, e))?,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(BackupError::store_read(key, e)),
        };

        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| BackupError::store_read(key, e))
    }

    async fn list(&self, prefix: &str, suffix: &str) -> Result<Vec<String>> {
        let prefix_path = self.build_path(prefix)?;

        let objects: Vec<_> = self
            .store
            .list(Some(&prefix_path))
            .try_collect()
            .await
            .map_err(|e| BackupError::store_read(prefix, e))?;

        // Return logical keys, without the bucket prefix
        let mut keys: Vec<String> = objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .map(|key| match key.strip_prefix(&self.prefix) {
                Some(relative) => relative.to_string(),
                None => key,
            })
            .filter(|key| is_listed(key, suffix))
            .collect();
        keys.sort();

        debug!(prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }
}
