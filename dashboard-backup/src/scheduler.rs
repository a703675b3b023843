//! Host fan-out.
//!
//! Every selected host gets its own task. Tasks wait on a shared semaphore so
//! at most `workers` hosts are processed at once. The run spawns everything,
//! then joins everything: a failing or panicking host is logged and counted,
//! its siblings keep going.

use crate::config::HostConfig;
use crate::orchestrator::filter::ALL;
use crate::orchestrator::{Workflow, WorkflowReport};
use crate::utils::{BackupError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn, Instrument};

/// One workflow to run against one host.
#[derive(Debug, Clone)]
pub struct HostJob {
    pub host: HostConfig,
    pub workflow: Workflow,
}

impl HostJob {
    pub fn label(&self) -> String {
        format!("{}:{}", self.host.name, self.workflow.name())
    }
}

#[async_trait]
pub trait HostRunner: Send + Sync + 'static {
    async fn run(&self, job: &HostJob) -> Result<WorkflowReport>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Bounded worker pool, owned by the caller for the length of one run.
pub struct FanOut {
    semaphore: Arc<Semaphore>,
    workers: usize,
}

impl FanOut {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Available parallelism minus one core for the controller, at least one.
    pub fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every job and wait for all of them.
    pub async fn run<R: HostRunner>(&self, jobs: Vec<HostJob>, runner: Arc<R>) -> RunSummary {
        info!(jobs = jobs.len(), workers = self.workers, "Starting host jobs");

        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            let label = job.label();
            let sem = Arc::clone(&self.semaphore);
            let runner = Arc::clone(&runner);
            let span = info_span!("host", host = %job.host.name, workflow = job.workflow.name());

            let handle = tokio::spawn(
                async move {
                    let _permit = sem
                        .acquire_owned()
                        .await
                        .map_err(|e| BackupError::Pool(e.to_string()))?;
                    runner.run(&job).await
                }
                .instrument(span),
            );
            handles.push((label, handle));
        }

        let mut summary = RunSummary::default();
        for (label, handle) in handles {
            match handle.await {
                Ok(Ok(report)) => {
                    info!(
                        job = %label,
                        processed = report.processed,
                        skipped = report.skipped,
                        "Host job finished"
                    );
                    summary.succeeded += 1;
                }
                Ok(Err(e)) if e.is_not_found() => {
                    warn!(job = %label, error = %e, "Host job found nothing to do");
                    summary.succeeded += 1;
                }
                Ok(Err(e)) => {
                    error!(job = %label, error = %e, "Host job failed");
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(job = %label, error = %e, "Host job panicked");
                    summary.failed += 1;
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "All host jobs completed"
        );
        summary
    }
}

/// Hosts from the roster matching the requested names (case-insensitive).
/// `all` selects the whole roster. Unknown names are logged and ignored.
pub fn select_hosts<S: AsRef<str>>(roster: &[HostConfig], requested: &[S]) -> Vec<HostConfig> {
    let wanted: HashSet<String> = requested
        .iter()
        .map(|name| name.as_ref().trim().to_lowercase())
        .collect();

    if wanted.contains(ALL) {
        return roster.to_vec();
    }

    let known: HashSet<String> = roster.iter().map(|h| h.name.to_lowercase()).collect();
    for name in wanted.iter().filter(|name| !known.contains(*name)) {
        warn!("Could not find host - {} in roster", name);
    }

    roster
        .iter()
        .filter(|host| wanted.contains(&host.name.to_lowercase()))
        .cloned()
        .collect()
}

/// One job per (host, workflow) pair, hosts in roster order.
pub fn plan_jobs(hosts: &[HostConfig], workflows: &[Workflow]) -> Vec<HostJob> {
    hosts
        .iter()
        .flat_map(|host| {
            workflows.iter().map(move |workflow| HostJob {
                host: host.clone(),
                workflow: workflow.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{BackupKind, DashboardFilter};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn host(name: &str) -> HostConfig {
        HostConfig {
            name: name.to_string(),
            url: format!("http://{}:3000", name),
            api_key: "key".to_string(),
        }
    }

    fn roster() -> Vec<HostConfig> {
        vec![host("prod"), host("Staging"), host("dev")]
    }

    fn hourly_jobs(hosts: &[HostConfig]) -> Vec<HostJob> {
        plan_jobs(hosts, &[Workflow::Backup(BackupKind::Hourly)])
    }

    /// Records concurrency and fails or panics on request.
    #[derive(Default)]
    struct ProbeRunner {
        active: AtomicUsize,
        peak: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HostRunner for ProbeRunner {
        async fn run(&self, job: &HostJob) -> Result<WorkflowReport> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(job.host.name.clone());

            match job.host.name.as_str() {
                "broken" => Err(BackupError::RemoteApi {
                    status: 500,
                    body: "down".into(),
                }),
                "panicky" => panic!("runner blew up"),
                _ => Ok(WorkflowReport {
                    processed: 1,
                    skipped: 0,
                }),
            }
        }
    }

    #[test]
    fn test_select_all_hosts() {
        assert_eq!(select_hosts(&roster(), &["all"]).len(), 3);
    }

    #[test]
    fn test_select_hosts_case_insensitive() {
        let selected = select_hosts(&roster(), &["staging", "PROD", "missing"]);
        let names: Vec<_> = selected.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["prod", "Staging"]);
    }

    #[test]
    fn test_plan_jobs_cross_product() {
        let jobs = plan_jobs(
            &roster()[..2],
            &[
                Workflow::Backup(BackupKind::Hourly),
                Workflow::Backup(BackupKind::Daily),
            ],
        );
        let labels: Vec<_> = jobs.iter().map(HostJob::label).collect();
        assert_eq!(
            labels,
            vec![
                "prod:hourly-backup",
                "prod:daily-backup",
                "Staging:hourly-backup",
                "Staging:daily-backup",
            ]
        );
    }

    #[test]
    fn test_workers_never_zero() {
        assert_eq!(FanOut::new(0).workers(), 1);
        assert!(FanOut::default_workers() >= 1);
    }

    #[tokio::test]
    async fn test_run_respects_worker_bound() {
        let hosts: Vec<_> = (0..8).map(|i| host(&format!("h{}", i))).collect();
        let runner = Arc::new(ProbeRunner::default());

        let summary = FanOut::new(2).run(hourly_jobs(&hosts), runner.clone()).await;

        assert_eq!(summary, RunSummary { succeeded: 8, failed: 0 });
        assert!(runner.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(runner.seen.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let hosts = vec![host("prod"), host("broken"), host("panicky"), host("dev")];
        let runner = Arc::new(ProbeRunner::default());

        let summary = FanOut::new(4).run(hourly_jobs(&hosts), runner.clone()).await;

        assert_eq!(summary, RunSummary { succeeded: 2, failed: 2 });
        let mut seen = runner.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["broken", "dev", "panicky", "prod"]);
    }

    #[tokio::test]
    async fn test_empty_run() {
        let summary = FanOut::new(2)
            .run(Vec::new(), Arc::new(ProbeRunner::default()))
            .await;
        assert_eq!(summary, RunSummary::default());
    }

    #[test]
    fn test_job_label() {
        let job = HostJob {
            host: host("prod"),
            workflow: Workflow::Revision {
                filter: DashboardFilter::All,
            },
        };
        assert_eq!(job.label(), "prod:revision-backup");
    }
}
