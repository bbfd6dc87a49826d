//! In-memory job store
//!
//! Used when no database is configured, and as the store in tests.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use uuid::Uuid;
use vpcforge_core::domain::job::Job;
use vpcforge_core::dto::job::StatusUpdate;

use super::job::{JobStore, StoreError};

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
    offline: AtomicBool,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("job map lock poisoned".to_string())
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(
        &self,
        job_id: Uuid,
        request_payload: serde_json::Value,
    ) -> Result<Job, StoreError> {
        self.check_online()?;

        let mut jobs = self.jobs.write().map_err(poisoned)?;
        if jobs.contains_key(&job_id) {
            return Err(StoreError::AlreadyExists(job_id));
        }

        let job = Job::pending(job_id, request_payload);
        jobs.insert(job_id, job.clone());
        Ok(job)
    }

    async fn update_status(&self, job_id: Uuid, update: StatusUpdate) -> Result<(), StoreError> {
        self.check_online()?;

        let mut jobs = self.jobs.write().map_err(poisoned)?;
        let job = jobs.get_mut(&job_id).ok_or(StoreError::NotFound(job_id))?;

        job.status = update.status;
        if let Some(results) = update.results {
            job.results = Some(results);
        }
        if let Some(message) = update.error_message {
            job.error_message = Some(message);
        }
        job.updated_at = chrono::Utc::now();

        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        self.check_online()?;

        let jobs = self.jobs.read().map_err(poisoned)?;
        Ok(jobs.get(&job_id).cloned())
    }
}
