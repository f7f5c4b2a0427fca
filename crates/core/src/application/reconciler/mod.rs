//! Blob Reconciliation Engine
//!
//! One call to [`BlobReconciler::reconcile`] is one pass over a job's blobs:
//! every blob is read in stored order, classified, and the verdicts are folded
//! into a single [`Decision`]. The engine keeps nothing between passes; the
//! caller re-invokes it after `retry_after` until a terminal decision comes
//! back.
//!
//! Fold rules:
//! - any aborted blob aborts the job, wherever it sits in the list
//! - any blob still busy, settling or empty keeps the job inconclusive
//! - otherwise every blob is resolved and the job is done, or needs a restart
//!   when a blob failed transformation or hit a modification-history conflict
//!
//! The only side effect is promoting settled transformed blobs to processed,
//! issued after the sweep and only when the pass is not aborted.

pub mod classify;
pub mod config;

pub use classify::{classify, debounce_satisfied, BlobVerdict};
pub use config::ReconcilerConfig;

use crate::domain::{BlobId, BlobState, Job};
use crate::error::Result;
use crate::port::{BlobStatusSource, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Every blob processed without conflict
    Done,
    /// Every blob resolved, but the job must be harvested again
    NeedsRestart,
    /// A blob was aborted by the service
    Aborted,
    /// Not decidable yet; reconcile again after `retry_after`
    Inconclusive {
        retry_after: Duration,
        /// Blobs advanced to processed during this pass
        promoted: usize,
    },
}

impl Decision {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Decision::Inconclusive { .. })
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Done => write!(f, "DONE"),
            Decision::NeedsRestart => write!(f, "NEEDS_RESTART"),
            Decision::Aborted => write!(f, "ABORTED"),
            Decision::Inconclusive { retry_after, .. } => {
                write!(f, "INCONCLUSIVE(retry after {}ms)", retry_after.as_millis())
            }
        }
    }
}

/// Accumulator of one pass
#[derive(Debug, Default)]
struct Sweep {
    resolved: usize,
    restart_needed: bool,
    retry_after: Option<Duration>,
    to_promote: Vec<BlobId>,
}

impl Sweep {
    fn wait_at_least(&mut self, delay: Duration) {
        self.retry_after = Some(self.retry_after.map_or(delay, |d| d.max(delay)));
    }
}

/// Reconciliation engine (stateless between passes)
pub struct BlobReconciler {
    blob_source: Arc<dyn BlobStatusSource>,
    time_provider: Arc<dyn TimeProvider>,
    config: ReconcilerConfig,
}

impl BlobReconciler {
    pub fn new(
        blob_source: Arc<dyn BlobStatusSource>,
        time_provider: Arc<dyn TimeProvider>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            blob_source,
            time_provider,
            config,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Run one pass over `job` and decide its next step.
    ///
    /// # Errors
    /// - `AppError::Domain(EmptyBlobList)` if the job has no blobs
    /// - any error of the blob source, unchanged; a failed read never turns
    ///   into `Inconclusive`
    pub async fn reconcile(&self, job: &Job) -> Result<Decision> {
        job.validate()?;

        let now = self.time_provider.now();
        let mut sweep = Sweep::default();

        for blob_id in &job.blob_ids {
            let status = self.blob_source.read_status(blob_id).await?;
            let verdict = classify(&status, now, self.config.debounce);

            debug!(
                job_id = %job.job_id,
                blob_id = %blob_id,
                state = %status.state,
                verdict = ?verdict,
                "Blob observed"
            );

            match verdict {
                BlobVerdict::Aborted => {
                    info!(job_id = %job.job_id, blob_id = %blob_id, "Blob aborted, aborting job");
                    return Ok(Decision::Aborted);
                }
                BlobVerdict::Busy => {
                    if status.state == BlobState::Unrecognized {
                        warn!(
                            job_id = %job.job_id,
                            blob_id = %blob_id,
                            "Blob in unrecognized state, treating as busy"
                        );
                    }
                    sweep.wait_at_least(self.config.busy_retry);
                }
                BlobVerdict::Settling => sweep.wait_at_least(self.config.settling_retry),
                BlobVerdict::Empty => {
                    warn!(
                        job_id = %job.job_id,
                        blob_id = %blob_id,
                        "Transformed blob has no records, not promoting"
                    );
                    sweep.wait_at_least(self.config.settling_retry);
                }
                BlobVerdict::Promote => {
                    sweep.to_promote.push(blob_id.clone());
                    sweep.wait_at_least(self.config.promotion_retry);
                }
                BlobVerdict::Resolved { conflict } => {
                    if conflict {
                        info!(
                            job_id = %job.job_id,
                            blob_id = %blob_id,
                            "Modification history conflict, job needs restart"
                        );
                    }
                    sweep.resolved += 1;
                    sweep.restart_needed |= conflict;
                }
                BlobVerdict::Failed => {
                    info!(job_id = %job.job_id, blob_id = %blob_id, "Blob transformation failed");
                    sweep.resolved += 1;
                    sweep.restart_needed = true;
                }
            }
        }

        for blob_id in &sweep.to_promote {
            info!(job_id = %job.job_id, blob_id = %blob_id, "Advancing blob to processed");
            self.blob_source.advance_to_processed(blob_id).await?;
        }

        if let Some(retry_after) = sweep.retry_after {
            return Ok(Decision::Inconclusive {
                retry_after,
                promoted: sweep.to_promote.len(),
            });
        }

        debug_assert_eq!(sweep.resolved, job.blob_ids.len());

        let decision = if sweep.restart_needed {
            Decision::NeedsRestart
        } else {
            Decision::Done
        };
        info!(
            job_id = %job.job_id,
            blobs = sweep.resolved,
            decision = %decision,
            "All blobs resolved"
        );
        Ok(decision)
    }
}
