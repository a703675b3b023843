//! Folder-level meta records.
//!
//! Every backup batch writes a `.meta_data` record next to the dashboards it
//! stores. In the revision hierarchy the same sentinel holds the watermark.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// Timestamp layout of batch meta records.
pub const META_TIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Hourly,
    Daily,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupKind::Hourly => "hourly",
            BackupKind::Daily => "daily",
        }
    }
}

impl std::fmt::Display for BackupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Written at `hourly/<host>/.meta_data` or `daily/<date>/<host>/.meta_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMeta {
    pub time: String,
    #[serde(rename = "type")]
    pub kind: BackupKind,
    pub mode: String,
}

impl BatchMeta {
    pub fn new<Tz: TimeZone>(kind: BackupKind, at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            time: at.format(META_TIME_FORMAT).to_string(),
            kind,
            mode: "Auto".to_string(),
        }
    }
}

/// Written at `revision/<host>/<title>_<uid>/.meta_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionMeta {
    /// Highest version stored in the folder
    pub version: u64,
}
