//! Job Repository
//!
//! Handles all database operations related to provisioning jobs.
//! Writes are last-write-wins: a job id is only ever written by the request
//! that created it and the single workflow run that owns it afterwards.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;
use vpcforge_core::domain::job::{Job, JobStatus};
use vpcforge_core::domain::topology::TopologyResult;
use vpcforge_core::dto::job::StatusUpdate;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job {0} already exists")]
    AlreadyExists(Uuid),

    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to (de)serialize job record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("job store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence of job records
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Writes a new `Pending` record
    async fn create_job(
        &self,
        job_id: Uuid,
        request_payload: serde_json::Value,
    ) -> Result<Job, StoreError>;

    /// Merges the given fields into an existing record
    ///
    /// Transition ordering is not checked here; the workflow is the only
    /// writer after creation and enforces it.
    async fn update_status(&self, job_id: Uuid, update: StatusUpdate) -> Result<(), StoreError>;

    /// Current snapshot of a job, `None` if it was never created
    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError>;
}

/// Postgres-backed job store
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
    table: String,
}

impl PgJobStore {
    /// `table` must be a validated identifier; it is interpolated into SQL.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(
        &self,
        job_id: Uuid,
        request_payload: serde_json::Value,
    ) -> Result<Job, StoreError> {
        let job = Job::pending(job_id, request_payload);

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (job_id, status, request_payload, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
            self.table
        ))
        .bind(job.job_id)
        .bind(job.status.as_str())
        .bind(&job.request_payload)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::AlreadyExists(job_id)
            }
            other => StoreError::Database(other),
        })?;

        Ok(job)
    }

    async fn update_status(&self, job_id: Uuid, update: StatusUpdate) -> Result<(), StoreError> {
        let results = update.results.as_ref().map(serde_json::to_value).transpose()?;

        let outcome = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET status = $1,
                results = COALESCE($2, results),
                error_message = COALESCE($3, error_message),
                updated_at = $4
            WHERE job_id = $5
            "#,
            self.table
        ))
        .bind(update.status.as_str())
        .bind(results)
        .bind(update.error_message)
        .bind(chrono::Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if outcome.rows_affected() == 0 {
            return Err(StoreError::NotFound(job_id));
        }

        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT job_id, status, request_payload, results, error_message,
                   created_at, updated_at
            FROM {}
            WHERE job_id = $1
            "#,
            self.table
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    job_id: Uuid,
    status: String,
    request_payload: serde_json::Value,
    results: Option<serde_json::Value>,
    error_message: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| StoreError::Unavailable(format!("corrupt record {}: {}", row.job_id, e)))?;

        let results = row
            .results
            .map(serde_json::from_value::<TopologyResult>)
            .transpose()?;

        Ok(Job {
            job_id: row.job_id,
            status,
            request_payload: row.request_payload,
            results,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
