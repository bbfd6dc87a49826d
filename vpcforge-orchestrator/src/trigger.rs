//! Job Trigger
//!
//! Starts a workflow run for an accepted job without blocking the request
//! that created it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use vpcforge_core::domain::topology::TopologyResult;
use vpcforge_core::dto::job::TriggerPayload;

use crate::workflow::{TopologyWorkflow, WorkflowError};

#[async_trait]
pub trait JobTrigger: Send + Sync {
    /// Hand the payload off for asynchronous execution
    ///
    /// Returns once the run has been started, not when it finishes.
    async fn trigger(&self, payload: TriggerPayload) -> anyhow::Result<()>;
}

/// Runs workflows as tokio tasks, at most `max_parallel` at a time
pub struct TaskTrigger {
    workflow: Arc<TopologyWorkflow>,
    semaphore: Arc<Semaphore>,
}

impl TaskTrigger {
    pub fn new(workflow: Arc<TopologyWorkflow>, max_parallel: usize) -> Self {
        Self {
            workflow,
            semaphore: Arc::new(Semaphore::new(max_parallel)),
        }
    }

    /// Spawn the run and return its handle
    pub fn spawn(&self, payload: TriggerPayload) -> JoinHandle<Result<TopologyResult, WorkflowError>> {
        let workflow = self.workflow.clone();
        let semaphore = self.semaphore.clone();

        tokio::spawn(async move {
            let job_id = payload.job_id;

            // A closed semaphore only happens on shutdown; run anyway
            let _permit = semaphore.acquire_owned().await.ok();

            let outcome = workflow.run(payload).await;
            match &outcome {
                Ok(result) => {
                    tracing::info!("Job {} finished: VPC {} ready", job_id, result.vpc_id);
                }
                Err(WorkflowError::StatusNotRecorded { results, source, .. }) => {
                    tracing::error!(
                        "Job {} provisioned VPC {} but its status could not be saved: {}",
                        job_id,
                        results.vpc_id,
                        source
                    );
                }
                Err(err) => {
                    tracing::warn!("Job {} failed: {}", job_id, err);
                }
            }
            outcome
        })
    }
}

#[async_trait]
impl JobTrigger for TaskTrigger {
    async fn trigger(&self, payload: TriggerPayload) -> anyhow::Result<()> {
        tracing::debug!("Triggering workflow for job {}", payload.job_id);
        drop(self.spawn(payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use uuid::Uuid;
    use vpcforge_core::domain::job::JobStatus;

    use crate::provider::{SimulatedProvider, WaitPolicy};
    use crate::repository::{JobStore, MemoryJobStore};
    use crate::workflow::WorkflowConfig;

    fn trigger(store: Arc<MemoryJobStore>, max_parallel: usize) -> TaskTrigger {
        let wait = WaitPolicy {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        };
        let provider = Arc::new(SimulatedProvider::new(vec![
            "us-east-1a".to_string(),
            "us-east-1b".to_string(),
        ]));
        let workflow = TopologyWorkflow::new(
            provider,
            store,
            WorkflowConfig {
                project_name: "test".to_string(),
                vpc_wait: wait,
                nat_gateway_wait: wait,
            },
        );
        TaskTrigger::new(Arc::new(workflow), max_parallel)
    }

    async fn accepted(store: &MemoryJobStore, cidr: &str) -> TriggerPayload {
        let job_id = Uuid::new_v4();
        store.create_job(job_id, json!({ "cidr": cidr })).await.unwrap();
        TriggerPayload {
            job_id,
            cidr: cidr.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_run_completes_job() {
        let store = Arc::new(MemoryJobStore::new());
        let trigger = trigger(store.clone(), 2);
        let payload = accepted(&store, "10.0.0.0/16").await;

        let result = trigger.spawn(payload.clone()).await.unwrap().unwrap();

        let job = store.get_job(payload.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.results.unwrap().vpc_id, result.vpc_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_beyond_the_limit_still_finish() {
        let store = Arc::new(MemoryJobStore::new());
        let trigger = trigger(store.clone(), 1);

        let mut handles = Vec::new();
        for cidr in ["10.0.0.0/16", "10.1.0.0/16", "10.2.0.0/16"] {
            let payload = accepted(&store, cidr).await;
            handles.push((payload.job_id, trigger.spawn(payload)));
        }

        for (job_id, handle) in handles {
            assert!(handle.await.unwrap().is_ok());
            let job = store.get_job(job_id).await.unwrap().unwrap();
            assert_eq!(job.status, JobStatus::Complete);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_is_returned_from_handle() {
        let store = Arc::new(MemoryJobStore::new());
        let trigger = trigger(store.clone(), 1);
        let payload = accepted(&store, "10.0.0.0/31").await;

        let err = trigger.spawn(payload.clone()).await.unwrap().unwrap_err();

        assert!(matches!(err, WorkflowError::Allocation(_)));
        let job = store.get_job(payload.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }
}
