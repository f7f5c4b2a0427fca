// Decision Application - persist a reconciliation decision through the Job Store

use crate::application::reconciler::Decision;
use crate::application::reset::reset_job_config;
use crate::domain::{Job, JobState};
use crate::error::Result;
use crate::port::JobStore;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Writes decisions back to the Job Store
pub struct DecisionApplier {
    job_store: Arc<dyn JobStore>,
}

impl DecisionApplier {
    pub fn new(job_store: Arc<dyn JobStore>) -> Self {
        Self { job_store }
    }

    /// Apply `decision` to `job`.
    ///
    /// Returns the state the job was moved to, or `None` for an inconclusive
    /// pass (no write at all).
    ///
    /// For a restart the rewound config is written before the state.
    pub async fn apply(&self, job: &Job, decision: &Decision) -> Result<Option<JobState>> {
        let new_state = match decision {
            Decision::Inconclusive {
                retry_after,
                promoted,
            } => {
                debug!(
                    job_id = %job.job_id,
                    retry_after_ms = retry_after.as_millis() as u64,
                    promoted = promoted,
                    "Job not decidable yet"
                );
                return Ok(None);
            }
            Decision::Done => JobState::Done,
            Decision::Aborted => JobState::Aborted,
            Decision::NeedsRestart => {
                let plan = reset_job_config(&job.job_config);
                if plan.is_config_error() {
                    error!(
                        job_id = %job.job_id,
                        harvest_type = %job.job_config.harvest_type(),
                        "Cannot restart job: unrecognized harvest type"
                    );
                } else {
                    self.job_store
                        .update_job_config(&job.job_id, &plan.job_config)
                        .await?;
                }
                plan.target_state
            }
        };

        self.job_store.set_state(&job.job_id, new_state).await?;
        info!(job_id = %job.job_id, decision = %decision, state = %new_state, "Job state updated");
        Ok(Some(new_state))
    }
}
