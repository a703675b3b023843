//! Grafana dashboard backup library
//!
//! Hourly/daily snapshots, restore, cross-server create and incremental
//! revision backup of Grafana dashboards, stored on disk or in S3.

pub mod config;
pub mod grafana;
pub mod naming;
pub mod orchestrator;
pub mod revision;
pub mod scheduler;
pub mod store;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::RosterConfig;
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
