//! Local filesystem backend.
//!
//! Documents are written as 4-space indented JSON with sorted keys so that
//! repeated backups of an unchanged dashboard produce identical files.

use super::{is_listed, BlobStore};
use crate::utils::{BackupError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

const OUTSIDE_ROOT: &str = "key has a relative path segment";

pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `key` under the root. `None` when a segment is `.` or `..`,
    /// so no key can reach outside the backup folder.
    fn path_for(&self, key: &str) -> Option<PathBuf> {
        key.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self.root.clone(), |path, part| match part {
                "." | ".." => None,
                _ => Some(path.join(part)),
            })
    }
}

#[async_trait]
impl BlobStore for FsStore {
    async fn put(&self, key: &str, value: &Value) -> Result<()> {
        let path = self
            .path_for(key)
            .ok_or_else(|| BackupError::store_write(key, OUTSIDE_ROOT))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackupError::store_write(key, e))?;
        }

        info!("Storing data on file: {}", path.display());
        let body = to_pretty_sorted(value)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| BackupError::store_write(key, e))
    }

    async fn fetch(&self, key: &str) -> Result<Option<Value>> {
        let path = self
            .path_for(key)
            .ok_or_else(|| BackupError::store_read(key, OUTSIDE_ROOT))?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackupError::store_read(key, e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| BackupError::store_read(key, e))
    }

    async fn list(&self, prefix: &str, suffix: &str) -> Result<Vec<String>> {
        let root = self.root.clone();
        let start = self
            .path_for(prefix)
            .ok_or_else(|| BackupError::store_read(prefix, OUTSIDE_ROOT))?;
        let suffix = suffix.to_string();

        // Use blocking task for the directory walk
        let keys = tokio::task::spawn_blocking(move || walk_keys(&root, &start, &suffix))
            .await
            .map_err(|e| BackupError::store_read(prefix, e))?
            .map_err(|e| BackupError::store_read(prefix, e))?;

        debug!(prefix, count = keys.len(), "Listed local backup files");
        Ok(keys)
    }
}

fn walk_keys(root: &Path, start: &Path, suffix: &str) -> std::io::Result<Vec<String>> {
    if !start.exists() {
        return Ok(Vec::new());
    }

    let mut keys = Vec::new();
    for entry in WalkDir::new(start).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if is_listed(&key, suffix) {
            keys.push(key);
        }
    }

    keys.sort();
    Ok(keys)
}

fn to_pretty_sorted(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    sort_keys(value).serialize(&mut serializer)?;
    Ok(out)
}

/// Rebuild objects with keys inserted in order, whatever map type serde_json uses.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_then_get() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FsStore::new(temp_dir.path());

        let doc = json!({"dashboard": {"uid": "abc", "title": "CPU Load"}});
        store.put("hourly/prod/cpuload_abc.json", &doc).await?;

        assert!(temp_dir.path().join("hourly/prod/cpuload_abc.json").exists());
        assert_eq!(store.get("hourly/prod/cpuload_abc.json").await?, doc);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_missing_is_none() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FsStore::new(temp_dir.path());
        assert!(store.fetch("revision/prod/mem_def/.meta_data").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_malformed_is_read_error() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        fs::create_dir_all(temp_dir.path().join("hourly/prod"))?;
        fs::write(temp_dir.path().join("hourly/prod/bad.json"), b"{not json")?;

        let store = FsStore::new(temp_dir.path());
        let err = store.fetch("hourly/prod/bad.json").await.unwrap_err();
        assert!(matches!(err, BackupError::StoreRead { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_written_json_is_indented_and_sorted() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FsStore::new(temp_dir.path());

        store.put("a.json", &json!({"b": 1, "a": {"d": 2, "c": 3}})).await?;

        let written = fs::read_to_string(temp_dir.path().join("a.json"))?;
        assert_eq!(
            written,
            "{\n    \"a\": {\n        \"c\": 3,\n        \"d\": 2\n    },\n    \"b\": 1\n}"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_list_skips_meta_and_other_suffixes() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FsStore::new(temp_dir.path());

        store.put("hourly/prod/.meta_data", &json!({"type": "hourly"})).await?;
        store.put("hourly/prod/mem_def.json", &json!({})).await?;
        store.put("hourly/prod/cpuload_abc.json", &json!({})).await?;
        store.put("hourly/staging/mem_xyz.json", &json!({})).await?;
        fs::write(temp_dir.path().join("hourly/prod/notes.txt"), b"x")?;

        let keys = store.list("hourly/prod/", ".json").await?;
        assert_eq!(
            keys,
            vec![
                "hourly/prod/cpuload_abc.json".to_string(),
                "hourly/prod/mem_def.json".to_string(),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_list_missing_prefix_is_empty() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FsStore::new(temp_dir.path());
        assert!(store.list("daily/01-01-2024/prod/", ".json").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_dot_segments_are_rejected() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("backups");
        let store = FsStore::new(&root);

        let err = store
            .put("hourly/prod/../../../escaped_x.json", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::StoreWrite { .. }));
        assert!(!temp_dir.path().join("escaped_x.json").exists());

        let err = store.fetch("hourly/./prod/mem_def.json").await.unwrap_err();
        assert!(matches!(err, BackupError::StoreRead { .. }));
        assert!(store.list("../", ".json").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_rewrite_is_byte_identical() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FsStore::new(temp_dir.path());
        let doc = json!({"dashboard": {"panels": [{"id": 1}], "version": 4}});

        store.put("hourly/prod/mem_def.json", &doc).await?;
        let first = fs::read(temp_dir.path().join("hourly/prod/mem_def.json"))?;
        store.put("hourly/prod/mem_def.json", &doc).await?;
        let second = fs::read(temp_dir.path().join("hourly/prod/mem_def.json"))?;

        assert_eq!(first, second);
        Ok(())
    }
}
