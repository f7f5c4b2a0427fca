// Job Store Port (Interface)

use crate::domain::{Job, JobConfig, JobId, JobState};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence of migration jobs, owned by the surrounding pipeline.
///
/// Implementations provide their own consistency: reads are at-least-once and
/// each write is atomic for a single job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// All jobs currently in `state`
    ///
    /// A stored job that cannot be decoded is moved to ERROR and left out;
    /// only a failure of the store itself is an error.
    async fn fetch_jobs_in_state(&self, state: JobState) -> Result<Vec<Job>>;

    /// Move a job to a new state
    ///
    /// # Errors
    /// - `AppError::NotFound` if the job does not exist
    async fn set_state(&self, job_id: &JobId, state: JobState) -> Result<()>;

    /// Replace a job's harvest configuration
    ///
    /// # Errors
    /// - `AppError::NotFound` if the job does not exist
    async fn update_job_config(&self, job_id: &JobId, job_config: &JobConfig) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::{Arc, Mutex};

    /// A write observed by the in-memory store, in call order
    #[derive(Debug, Clone, PartialEq)]
    pub enum StoreWrite {
        SetState { job_id: JobId, state: JobState },
        UpdateJobConfig { job_id: JobId, job_config: JobConfig },
    }

    /// In-memory Job Store for testing
    #[derive(Default)]
    pub struct InMemoryJobStore {
        jobs: Arc<Mutex<Vec<Job>>>,
        writes: Arc<Mutex<Vec<StoreWrite>>>,
        fail_fetch: Arc<Mutex<Option<String>>>,
    }

    impl InMemoryJobStore {
        pub fn new(jobs: Vec<Job>) -> Self {
            Self {
                jobs: Arc::new(Mutex::new(jobs)),
                ..Default::default()
            }
        }

        pub fn insert(&self, job: Job) {
            self.jobs.lock().unwrap().push(job);
        }

        pub fn job(&self, job_id: &str) -> Option<Job> {
            self.jobs
                .lock()
                .unwrap()
                .iter()
                .find(|j| j.job_id == job_id)
                .cloned()
        }

        pub fn writes(&self) -> Vec<StoreWrite> {
            self.writes.lock().unwrap().clone()
        }

        /// Make every `fetch_jobs_in_state` call fail with a database error
        pub fn fail_fetch(&self, message: impl Into<String>) {
            *self.fail_fetch.lock().unwrap() = Some(message.into());
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn fetch_jobs_in_state(&self, state: JobState) -> Result<Vec<Job>> {
            if let Some(msg) = self.fail_fetch.lock().unwrap().clone() {
                return Err(AppError::Database(msg));
            }
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.state == state)
                .cloned()
                .collect())
        }

        async fn set_state(&self, job_id: &JobId, state: JobState) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .iter_mut()
                .find(|j| &j.job_id == job_id)
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;
            job.state = state;
            self.writes.lock().unwrap().push(StoreWrite::SetState {
                job_id: job_id.clone(),
                state,
            });
            Ok(())
        }

        async fn update_job_config(&self, job_id: &JobId, job_config: &JobConfig) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .iter_mut()
                .find(|j| &j.job_id == job_id)
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;
            job.job_config = job_config.clone();
            self.writes.lock().unwrap().push(StoreWrite::UpdateJobConfig {
                job_id: job_id.clone(),
                job_config: job_config.clone(),
            });
            Ok(())
        }
    }
}
