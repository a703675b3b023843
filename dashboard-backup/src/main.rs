//! Grafana dashboard backup - command line entry point
//!
//! Batch tool meant to be run from an external scheduler (cron, k8s CronJob).

use anyhow::Result;
use clap::{CommandFactory, Parser, ValueEnum};
use dashboard_backup::config::{resolve_config_path, RosterConfig};
use dashboard_backup::orchestrator::{BackupKind, DashboardFilter, GrafanaRunner, RestoreSource, Workflow};
use dashboard_backup::scheduler::{plan_jobs, select_hosts, FanOut};
use dashboard_backup::store::Store;
use dashboard_backup::utils;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Grafana backup script.", long_about = None)]
struct Args {
    /// Backup type to take
    #[arg(short = 'b', long, value_enum, ignore_case = true)]
    backup: Option<BackupArg>,

    /// Hosts to restore, "all" for every configured host
    #[arg(short = 'r', long, num_args = 1.., value_name = "HOST")]
    restore: Option<Vec<String>>,

    /// Hosts to create dashboards on, "all" for every configured host
    #[arg(short = 'c', long, num_args = 1.., value_name = "HOST")]
    create: Option<Vec<String>>,

    /// Hosts to take a revision backup of, "all" for every configured host
    #[arg(long = "revision_backup", visible_alias = "rb", num_args = 1.., value_name = "HOST")]
    revision_backup: Option<Vec<String>>,

    /// Dashboard uids (or <title>_<uid> names) for restore/create/revision, "all" for every dashboard
    #[arg(long = "dashboard_uid", visible_alias = "db_uid", num_args = 1.., default_value = "all", value_name = "UID")]
    dashboard_uid: Vec<String>,

    /// Restore/create source: hourly, daily (every dated folder) or a date such as 28-04-2020
    #[arg(long = "restore_from", visible_alias = "rfrom", default_value = "hourly")]
    restore_from: String,

    /// Path to the host roster
    #[arg(long = "config_file", visible_alias = "conf", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log_level", default_value = "info")]
    log_level: String,

    /// Number of hosts processed in parallel (defaults to CPU count - 1)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackupArg {
    Hourly,
    Daily,
    Both,
}

/// What this run does. The first given option wins.
#[derive(Debug)]
enum Operation {
    Backup(Vec<Workflow>),
    Restore(Vec<String>, Workflow),
    Create(Vec<String>, Workflow),
    Revision(Vec<String>, Workflow),
}

impl Args {
    fn operation(&self) -> Result<Option<Operation>> {
        let filter = DashboardFilter::from_names(&self.dashboard_uid);

        if let Some(kind) = self.backup {
            let workflows = match kind {
                BackupArg::Hourly => vec![Workflow::Backup(BackupKind::Hourly)],
                BackupArg::Daily => vec![Workflow::Backup(BackupKind::Daily)],
                BackupArg::Both => vec![
                    Workflow::Backup(BackupKind::Hourly),
                    Workflow::Backup(BackupKind::Daily),
                ],
            };
            return Ok(Some(Operation::Backup(workflows)));
        }

        if let Some(hosts) = &self.restore {
            let source = RestoreSource::parse(&self.restore_from)?;
            return Ok(Some(Operation::Restore(
                lowercase(hosts),
                Workflow::Restore { source, filter },
            )));
        }

        if let Some(hosts) = &self.create {
            let source = RestoreSource::parse(&self.restore_from)?;
            return Ok(Some(Operation::Create(
                lowercase(hosts),
                Workflow::Create { source, filter },
            )));
        }

        if let Some(hosts) = &self.revision_backup {
            return Ok(Some(Operation::Revision(
                lowercase(hosts),
                Workflow::Revision { filter },
            )));
        }

        Ok(None)
    }
}

fn lowercase(names: &[String]) -> Vec<String> {
    names.iter().map(|n| n.to_lowercase()).collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    utils::logger::init(&args.log_level)?;

    let Some(operation) = args.operation()? else {
        Args::command().print_help()?;
        return Ok(());
    };

    tracing::info!(
        "Starting dashboard-backup v{} ({:?})",
        env!("CARGO_PKG_VERSION"),
        operation
    );

    // Load configuration
    let config_path = resolve_config_path(args.config_file.clone());
    let roster = RosterConfig::load(&config_path)?;
    tracing::info!(
        "Loaded {} hosts from {}",
        roster.grafana_urls.len(),
        config_path.display()
    );

    let store = Arc::new(Store::from_config(&roster.backup)?);
    tracing::info!("Using {} storage", store.describe());

    let jobs = match operation {
        Operation::Backup(workflows) => plan_jobs(&roster.grafana_urls, &workflows),
        Operation::Restore(hosts, workflow)
        | Operation::Create(hosts, workflow)
        | Operation::Revision(hosts, workflow) => {
            plan_jobs(&select_hosts(&roster.grafana_urls, hosts.as_slice()), &[workflow])
        }
    };

    let fan_out = FanOut::new(args.workers.unwrap_or_else(FanOut::default_workers));
    let summary = fan_out.run(jobs, Arc::new(GrafanaRunner::new(store))).await;

    tracing::info!(
        "Completed Grafana run: {} jobs succeeded, {} failed",
        summary.succeeded,
        summary.failed
    );

    Ok(())
}
