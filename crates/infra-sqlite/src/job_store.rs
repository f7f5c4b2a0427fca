// SQLite JobStore Implementation

use async_trait::async_trait;
use blob_watcher_core::domain::{BlobId, Job, JobConfig, JobId, JobState};
use blob_watcher_core::error::{AppError, Result};
use blob_watcher_core::port::{JobStore, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, error, warn};

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            Some(code) => match code.as_ref() {
                "2067" | "1555" => AppError::Database(format!(
                    "Unique constraint violation: {} ({})",
                    db_err.message(),
                    code
                )),
                "5" => AppError::Database(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                other => AppError::Database(format!(
                    "Database error [{}]: {}",
                    other,
                    db_err.message()
                )),
            },
            None => AppError::Database(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

pub struct SqliteJobStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Insert a job (seeding and tests; production jobs come from the harvesters)
    pub async fn insert(&self, job: &Job) -> Result<()> {
        let now = self.time_provider.now().timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO jobs (job_id, state, blob_ids, job_config, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.job_id)
        .bind(job.state.as_str())
        .bind(serde_json::to_string(&job.blob_ids)?)
        .bind(serde_json::to_string(&job.job_config)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    /// Find job by ID
    pub async fn find_by_id(&self, job_id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT job_id, state, blob_ids, job_config FROM jobs WHERE job_id = ?",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    /// Move a row that cannot be decoded to ERROR so later sweeps skip it
    async fn quarantine(&self, job_id: &str, cause: AppError) {
        warn!(job_id = %job_id, error = %cause, "Undecodable job row, moving to ERROR");

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, modified_at = ?
            WHERE job_id = ?
              AND state NOT IN (?, ?, ?)
            "#,
        )
        .bind(JobState::Error.as_str())
        .bind(self.time_provider.now().timestamp_millis())
        .bind(job_id)
        .bind(JobState::Done.as_str())
        .bind(JobState::Error.as_str())
        .bind(JobState::Aborted.as_str())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(
                job_id = %job_id,
                error = %map_sqlx_error(e),
                "Failed to move job row to ERROR"
            );
        }
    }

    /// Explain why a conditional update touched no row
    async fn missed_update(&self, job_id: &JobId, target: JobState) -> AppError {
        let current: std::result::Result<Option<String>, _> =
            sqlx::query_scalar("SELECT state FROM jobs WHERE job_id = ?")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await;

        match current {
            Ok(None) => AppError::NotFound(format!("Job {} not found", job_id)),
            Ok(Some(state)) => AppError::InvalidState(format!(
                "Cannot move job {} from {} to {}",
                job_id, state, target
            )),
            Err(e) => map_sqlx_error(e),
        }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn fetch_jobs_in_state(&self, state: JobState) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT job_id, state, blob_ids, job_config
            FROM jobs
            WHERE state = ?
            ORDER BY created_at ASC, job_id ASC
            "#,
        )
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(state = %state, count = rows.len(), "Fetched jobs");

        // One undecodable row must not hide the rest
        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let job_id = row.job_id.clone();
            match row.into_job() {
                Ok(job) => jobs.push(job),
                Err(e) => self.quarantine(&job_id, e).await,
            }
        }
        Ok(jobs)
    }

    async fn set_state(&self, job_id: &JobId, state: JobState) -> Result<()> {
        let now = self.time_provider.now().timestamp_millis();

        // Conditional: a job that reached a terminal state stays there
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, modified_at = ?
            WHERE job_id = ?
              AND state NOT IN (?, ?, ?)
            "#,
        )
        .bind(state.as_str())
        .bind(now)
        .bind(job_id)
        .bind(JobState::Done.as_str())
        .bind(JobState::Error.as_str())
        .bind(JobState::Aborted.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            let err = self.missed_update(job_id, state).await;
            warn!(job_id = %job_id, state = %state, error = %err, "State update rejected");
            return Err(err);
        }
        Ok(())
    }

    async fn update_job_config(&self, job_id: &JobId, job_config: &JobConfig) -> Result<()> {
        let now = self.time_provider.now().timestamp_millis();

        let result = sqlx::query("UPDATE jobs SET job_config = ?, modified_at = ? WHERE job_id = ?")
            .bind(serde_json::to_string(job_config)?)
            .bind(now)
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {} not found", job_id)));
        }
        Ok(())
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    job_id: String,
    state: String,
    blob_ids: String,   // JSON array
    job_config: String, // JSON object
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let state: JobState = self.state.parse()?;
        let blob_ids: Vec<BlobId> = serde_json::from_str(&self.blob_ids)?;
        let job_config: JobConfig = serde_json::from_str(&self.job_config)?;

        Ok(Job {
            job_id: self.job_id,
            state,
            blob_ids,
            job_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use blob_watcher_core::domain::{HarvestSearch, HarvestType};
    use blob_watcher_core::port::time_provider::mocks::FixedTimeProvider;
    use blob_watcher_core::port::time_provider::SystemTimeProvider;

    fn sru_config(offset: u64) -> JobConfig {
        let search = HarvestSearch::new(HarvestType::Sru)
            .with("offset", serde_json::json!(offset))
            .with("url", serde_json::json!("https://sru.example.org/bib"))
            .with("maxRecords", serde_json::json!(50));
        JobConfig::new(search)
            .with("linkDataHarvesterApiProfileId", serde_json::json!("link-data"))
    }

    async fn setup_store() -> SqliteJobStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteJobStore::new(pool, Arc::new(SystemTimeProvider))
    }

    fn job(id: &str, blobs: &[&str]) -> Job {
        Job::new(id, blobs.iter().map(|s| s.to_string()).collect(), sru_config(40))
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = setup_store().await;
        let job = job("job-1", &["b2", "b1"]);

        store.insert(&job).await.unwrap();

        let found = store.find_by_id("job-1").await.unwrap().unwrap();
        assert_eq!(found, job);
        assert_eq!(found.blob_ids, vec!["b2", "b1"]);
        assert!(store.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = setup_store().await;
        store.insert(&job("job-1", &["b1"])).await.unwrap();

        let err = store.insert(&job("job-1", &["b1"])).await.unwrap_err();
        assert!(err.to_string().contains("Unique constraint"));
    }

    #[tokio::test]
    async fn test_fetch_jobs_in_state_in_creation_order() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let clock = Arc::new(FixedTimeProvider::new(chrono::Utc::now()));
        let store = SqliteJobStore::new(pool, clock.clone());

        store.insert(&job("job-b", &["b1"])).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        store.insert(&job("job-a", &["b2"])).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        let mut harvesting = job("job-c", &["b3"]);
        harvesting.state = JobState::PendingSruHarvester;
        store.insert(&harvesting).await.unwrap();

        let pending = store
            .fetch_jobs_in_state(JobState::PendingReconciliation)
            .await
            .unwrap();
        let ids: Vec<_> = pending.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(ids, vec!["job-b", "job-a"]);

        let harvesting = store
            .fetch_jobs_in_state(JobState::PendingSruHarvester)
            .await
            .unwrap();
        assert_eq!(harvesting.len(), 1);
    }

    #[tokio::test]
    async fn test_set_state() {
        let store = setup_store().await;
        store.insert(&job("job-1", &["b1"])).await.unwrap();

        tokio_test::assert_ok!(
            store
                .set_state(&"job-1".to_string(), JobState::PendingSruHarvester)
                .await
        );
        let found = store.find_by_id("job-1").await.unwrap().unwrap();
        assert_eq!(found.state, JobState::PendingSruHarvester);
    }

    #[tokio::test]
    async fn test_terminal_state_is_final() {
        let store = setup_store().await;
        store.insert(&job("job-1", &["b1"])).await.unwrap();
        let id = "job-1".to_string();

        store.set_state(&id, JobState::Done).await.unwrap();
        let err = store.set_state(&id, JobState::Aborted).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidState(_)));
        let found = store.find_by_id("job-1").await.unwrap().unwrap();
        assert_eq!(found.state, JobState::Done);
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let store = setup_store().await;
        let id = "ghost".to_string();

        let err = store.set_state(&id, JobState::Done).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = store
            .update_job_config(&id, &sru_config(0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_job_config_keeps_every_field() {
        let store = setup_store().await;
        store.insert(&job("job-1", &["b1"])).await.unwrap();

        let rewound = sru_config(0);
        store
            .update_job_config(&"job-1".to_string(), &rewound)
            .await
            .unwrap();

        let found = store.find_by_id("job-1").await.unwrap().unwrap();
        assert_eq!(found.job_config, rewound);
        assert_eq!(
            found.job_config.link_data_harvest_search.get("maxRecords"),
            Some(&serde_json::json!(50))
        );
    }

    #[tokio::test]
    async fn test_unknown_stored_state_is_an_error() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        sqlx::query(
            "INSERT INTO jobs (job_id, state, blob_ids, job_config, created_at, modified_at) \
             VALUES ('job-x', 'RUNNING', '[]', '{}', 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        let store = SqliteJobStore::new(pool, Arc::new(SystemTimeProvider));

        let result = store.find_by_id("job-x").await;
        assert!(matches!(result, Err(AppError::Domain(_))));
    }

    #[tokio::test]
    async fn test_undecodable_row_is_moved_to_error_and_skipped() {
        let store = setup_store().await;
        store.insert(&job("good", &["b1"])).await.unwrap();
        // Harvest search without a type
        sqlx::query(
            "INSERT INTO jobs (job_id, state, blob_ids, job_config, created_at, modified_at) \
             VALUES ('bad', 'PENDING_RECONCILIATION', '[\"b2\"]', \
             '{\"linkDataHarvestSearch\":{\"from\":\"record\"}}', 0, 0)",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let pending = store
            .fetch_jobs_in_state(JobState::PendingReconciliation)
            .await
            .unwrap();

        let ids: Vec<_> = pending.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(ids, vec!["good"]);
        let state: String = sqlx::query_scalar("SELECT state FROM jobs WHERE job_id = 'bad'")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(state, JobState::Error.as_str());

        // Not offered again
        let again = store
            .fetch_jobs_in_state(JobState::PendingReconciliation)
            .await
            .unwrap();
        assert_eq!(again.len(), 1);
    }
}
