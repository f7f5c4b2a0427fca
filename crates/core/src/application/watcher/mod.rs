// Watcher - sweeps jobs awaiting reconciliation and applies decisions

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::apply::DecisionApplier;
use crate::application::reconciler::{BlobReconciler, Decision};
use crate::domain::{Job, JobId, JobState};
use crate::error::{AppError, Result};
use crate::port::JobStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Scheduling knobs of the watcher loop
#[derive(Debug, Clone)]
pub struct WatcherSettings {
    pub poll_interval: Duration,
    pub max_concurrency: usize,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Tally of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Jobs fetched in PENDING_RECONCILIATION
    pub examined: usize,
    /// Jobs already being reconciled by another sweep of this process
    pub skipped_in_flight: usize,
    /// Jobs without blobs, moved to ERROR
    pub rejected: usize,
    pub done: usize,
    pub restarted: usize,
    pub aborted: usize,
    /// Restarts refused because of an unrecognized harvest type
    pub config_errors: usize,
    pub inconclusive: usize,
    /// Jobs whose pass ended in an error; retried on a later sweep
    pub failed: usize,
    /// Earliest retry requested by an inconclusive job
    pub next_retry: Option<Duration>,
}

impl SweepReport {
    fn record(&mut self, decision: &Decision, new_state: Option<JobState>) {
        match decision {
            Decision::Done => self.done += 1,
            Decision::Aborted => self.aborted += 1,
            Decision::NeedsRestart if new_state == Some(JobState::Error) => {
                self.config_errors += 1
            }
            Decision::NeedsRestart => self.restarted += 1,
            Decision::Inconclusive { retry_after, .. } => {
                self.inconclusive += 1;
                self.next_retry =
                    Some(self.next_retry.map_or(*retry_after, |d| d.min(*retry_after)));
            }
        }
    }
}

/// Polls the Job Store and drives each pending job through the reconciler
pub struct Watcher {
    job_store: Arc<dyn JobStore>,
    reconciler: Arc<BlobReconciler>,
    applier: Arc<DecisionApplier>,
    settings: WatcherSettings,
    in_flight: Arc<Mutex<HashSet<JobId>>>,
}

impl Watcher {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        reconciler: Arc<BlobReconciler>,
        settings: WatcherSettings,
    ) -> Self {
        Self {
            applier: Arc::new(DecisionApplier::new(job_store.clone())),
            job_store,
            reconciler,
            settings,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Run sweeps until shutdown is requested
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            max_concurrency = self.settings.max_concurrency,
            "Watcher started"
        );
        loop {
            if shutdown.is_shutdown() {
                info!("Watcher shutting down");
                break;
            }

            let pause = match self.sweep().await {
                Ok(report) => report.next_retry.unwrap_or(self.settings.poll_interval),
                Err(e) => {
                    error!(error = %e, "Sweep failed");
                    ERROR_RECOVERY_SLEEP_DURATION
                }
            };

            debug!(pause_ms = pause.as_millis() as u64, "Waiting for next sweep");
            if shutdown.sleep(pause).await {
                info!("Watcher interrupted while waiting");
                break;
            }
        }
        info!("Watcher stopped");
        Ok(())
    }

    /// Reconcile every job currently pending reconciliation, once.
    ///
    /// Per-job errors are logged and counted; only a failure to fetch the
    /// candidate jobs fails the sweep.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let jobs = self
            .job_store
            .fetch_jobs_in_state(JobState::PendingReconciliation)
            .await?;

        let mut report = SweepReport {
            examined: jobs.len(),
            ..Default::default()
        };
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut claimed = Vec::new();

        for job in jobs {
            debug!(job_id = %job.job_id, blobs = job.blob_ids.len(), "Candidate job");

            if let Err(e) = job.validate() {
                warn!(job_id = %job.job_id, error = %e, "Rejecting job");
                match self.job_store.set_state(&job.job_id, JobState::Error).await {
                    Ok(()) => report.rejected += 1,
                    Err(e) => {
                        error!(job_id = %job.job_id, error = %e, "Failed to reject job");
                        report.failed += 1;
                    }
                }
                continue;
            }

            if !self.claim(&job.job_id) {
                debug!(job_id = %job.job_id, "Job already in flight, skipping");
                report.skipped_in_flight += 1;
                continue;
            }
            claimed.push(job.job_id.clone());

            let permits = Arc::clone(&permits);
            let reconciler = Arc::clone(&self.reconciler);
            let applier = Arc::clone(&self.applier);
            tasks.spawn(async move {
                let outcome = Self::reconcile_job(&permits, &reconciler, &applier, &job).await;
                (job.job_id, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok((decision, new_state)))) => report.record(&decision, new_state),
                Ok((job_id, Err(e))) => {
                    error!(job_id = %job_id, error = %e, "Reconciliation failed");
                    report.failed += 1;
                }
                Err(join_err) => {
                    // Task panicked or was cancelled
                    error!(error = ?join_err, "Reconciliation task did not complete");
                    report.failed += 1;
                }
            }
        }
        self.release(&claimed);

        info!(
            examined = report.examined,
            done = report.done,
            restarted = report.restarted,
            aborted = report.aborted,
            inconclusive = report.inconclusive,
            rejected = report.rejected,
            config_errors = report.config_errors,
            failed = report.failed,
            "Sweep complete"
        );
        Ok(report)
    }

    async fn reconcile_job(
        permits: &Semaphore,
        reconciler: &BlobReconciler,
        applier: &DecisionApplier,
        job: &Job,
    ) -> Result<(Decision, Option<JobState>)> {
        let _permit = permits
            .acquire()
            .await
            .map_err(|e| AppError::Internal(format!("Semaphore closed: {}", e)))?;

        info!(job_id = %job.job_id, blobs = job.blob_ids.len(), "Reconciling job");
        let decision = reconciler.reconcile(job).await?;
        let new_state = applier.apply(job, &decision).await?;
        Ok((decision, new_state))
    }

    /// Mark a job as in flight; false if it already is
    fn claim(&self, job_id: &JobId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(job_id.clone())
    }

    fn release(&self, job_ids: &[JobId]) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for job_id in job_ids {
            in_flight.remove(job_id);
        }
    }
}
