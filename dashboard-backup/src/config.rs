//! Host roster and storage configuration.
//!
//! The roster is a JSON document listing every Grafana instance plus the
//! storage backends to write to. It is loaded once, validated, and treated as
//! read-only for the rest of the run.

use crate::utils::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Roster file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "grafana_urls.json";

/// Directory checked when the roster is absent from the working directory.
pub const FALLBACK_CONFIG_DIR: &str = "/config/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Every Grafana instance this run may touch
    pub grafana_urls: Vec<HostConfig>,

    /// Storage backends
    #[serde(default)]
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Unique host name, compared case-insensitively
    pub name: String,

    /// Base URL of the Grafana instance
    pub url: String,

    /// Bearer token sent with every request
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default)]
    pub local: LocalBackupConfig,

    #[serde(default)]
    pub s3: S3BackupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalBackupConfig {
    /// Write backups to the local filesystem
    #[serde(default = "default_local_enabled")]
    pub enabled: bool,

    /// Root directory for local backups (empty = working directory)
    #[serde(default)]
    pub backup_folder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3BackupConfig {
    /// Write backups to S3-compatible object storage
    #[serde(default)]
    pub enabled: bool,

    /// Target bucket, required when enabled
    #[serde(default)]
    pub bucket_name: Option<String>,

    /// Key prefix for every object
    #[serde(default = "default_s3_backup_folder")]
    pub backup_folder: String,

    /// Region override (otherwise taken from the environment)
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible stores
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_local_enabled() -> bool {
    true
}

fn default_s3_backup_folder() -> String {
    "grafana/backup/".to_string()
}

impl Default for LocalBackupConfig {
    fn default() -> Self {
        Self {
            enabled: default_local_enabled(),
            backup_folder: String::new(),
        }
    }
}

impl Default for S3BackupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bucket_name: None,
            backup_folder: default_s3_backup_folder(),
            region: None,
            endpoint: None,
        }
    }
}

impl RosterConfig {
    /// Load and validate the roster from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BackupError::Config(format!("cannot read roster {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a roster document
    pub fn from_json(content: &str) -> Result<Self> {
        let config: RosterConfig = serde_json::from_str(content)
            .map_err(|e| BackupError::Config(format!("malformed roster: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for host in &self.grafana_urls {
            if host.name.trim().is_empty() {
                return Err(BackupError::Config("host entry without a name".into()));
            }
            if host.url.trim().is_empty() {
                return Err(BackupError::Config(format!("host {} has no url", host.name)));
            }
            if host.api_key.trim().is_empty() {
                return Err(BackupError::Config(format!("host {} has no api_key", host.name)));
            }
            if !seen.insert(host.name.to_lowercase()) {
                return Err(BackupError::Config(format!("duplicate host name {}", host.name)));
            }
        }

        let s3 = &self.backup.s3;
        if s3.enabled && s3.bucket_name.as_deref().map_or(true, |b| b.trim().is_empty()) {
            return Err(BackupError::Config(
                "s3 backup is enabled but bucket_name is missing".into(),
            ));
        }
        if !s3.enabled && !self.backup.local.enabled {
            return Err(BackupError::Config(
                "neither local nor s3 backup is enabled".into(),
            ));
        }

        Ok(())
    }
}

/// Resolve the roster location.
///
/// An explicitly given path is used as is. The default file name falls back to
/// `/config/grafana_urls.json` when it does not exist in the working directory.
pub fn resolve_config_path(requested: Option<PathBuf>) -> PathBuf {
    match requested {
        Some(path) if path != Path::new(DEFAULT_CONFIG_FILE) => path,
        _ => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default.exists() {
                default
            } else {
                PathBuf::from(FALLBACK_CONFIG_DIR).join(DEFAULT_CONFIG_FILE)
            }
        }
    }
}
