//! Job Service
//!
//! Accepts provisioning requests and answers status queries.

use serde_json::Value;
use uuid::Uuid;
use vpcforge_core::allocator::parse_cidr;
use vpcforge_core::domain::job::{Job, JobStatus};
use vpcforge_core::dto::job::{JobAccepted, TriggerPayload};

use crate::repository::{JobStore, StoreError};
use crate::trigger::JobTrigger;

/// Service error type
#[derive(Debug)]
pub enum JobError {
    NotFound(String),
    ValidationError(String),
    StoreError(StoreError),
    TriggerError(anyhow::Error),
}

impl From<StoreError> for JobError {
    fn from(err: StoreError) -> Self {
        JobError::StoreError(err)
    }
}

/// Record a new job and start its workflow
///
/// `body` is the parsed request body. It is stored verbatim as the job's
/// request payload once its `cidr` field checks out.
pub async fn create_job(
    store: &dyn JobStore,
    trigger: &dyn JobTrigger,
    body: Value,
) -> Result<JobAccepted, JobError> {
    let cidr = validate_create(&body)?;

    let job_id = Uuid::new_v4();
    let job = store.create_job(job_id, body).await?;

    tracing::info!("Job {} recorded for CIDR {}", job.job_id, cidr);

    trigger
        .trigger(TriggerPayload { job_id, cidr })
        .await
        .map_err(JobError::TriggerError)?;

    Ok(JobAccepted {
        job_id: job.job_id,
        status: JobStatus::Pending,
    })
}

/// Get a job by its id as it appeared in the request path
pub async fn get_job(store: &dyn JobStore, job_id: &str) -> Result<Job, JobError> {
    // Ids we never minted cannot exist
    let id = Uuid::parse_str(job_id).map_err(|_| JobError::NotFound(job_id.to_string()))?;

    store
        .get_job(id)
        .await?
        .ok_or_else(|| JobError::NotFound(job_id.to_string()))
}

// =============================================================================
// Validation
// =============================================================================

fn validate_create(body: &Value) -> Result<String, JobError> {
    let object = body.as_object().ok_or_else(|| {
        JobError::ValidationError("The request body must be a JSON object.".to_string())
    })?;

    let cidr = match object.get("cidr") {
        None | Some(Value::Null) => {
            return Err(JobError::ValidationError(
                "Required field missing: 'cidr'".to_string(),
            ));
        }
        Some(Value::String(cidr)) => cidr.trim().to_string(),
        Some(_) => {
            return Err(JobError::ValidationError(
                "Field 'cidr' must be a string".to_string(),
            ));
        }
    };

    parse_cidr(&cidr).map_err(|e| JobError::ValidationError(e.to_string()))?;

    Ok(cidr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::repository::MemoryJobStore;

    #[derive(Default)]
    struct RecordingTrigger {
        payloads: Mutex<Vec<TriggerPayload>>,
        fail: bool,
    }

    #[async_trait]
    impl JobTrigger for RecordingTrigger {
        async fn trigger(&self, payload: TriggerPayload) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("trigger unavailable");
            }
            self.payloads.lock().unwrap().push(payload);
            Ok(())
        }
    }

    #[test]
    fn test_validate_create_accepts_cidr() {
        assert_eq!(
            validate_create(&json!({ "cidr": "10.0.0.0/16" })).unwrap(),
            "10.0.0.0/16"
        );
        assert_eq!(
            validate_create(&json!({ "cidr": " 172.16.0.0/20 ", "note": "x" })).unwrap(),
            "172.16.0.0/20"
        );
    }

    #[test]
    fn test_validate_create_rejects_bad_bodies() {
        for body in [
            json!({}),
            json!({ "cidr": null }),
            json!({ "cidr": 10 }),
            json!({ "cidr": "10.0.0.1/16" }),
            json!({ "cidr": "not-a-cidr" }),
            json!(["10.0.0.0/16"]),
        ] {
            assert!(
                matches!(validate_create(&body), Err(JobError::ValidationError(_))),
                "{} should be rejected",
                body
            );
        }
    }

    #[test]
    fn test_missing_cidr_message() {
        match validate_create(&json!({ "region": "us-east-1" })) {
            Err(JobError::ValidationError(msg)) => assert_eq!(msg, "Required field missing: 'cidr'"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_job_records_and_triggers() {
        let store = MemoryJobStore::new();
        let trigger = RecordingTrigger::default();
        let body = json!({ "cidr": "10.0.0.0/16" });

        let accepted = create_job(&store, &trigger, body.clone()).await.unwrap();

        assert_eq!(accepted.status, JobStatus::Pending);
        let job = store.get_job(accepted.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.request_payload, body);

        let payloads = trigger.payloads.lock().unwrap();
        assert_eq!(
            *payloads,
            vec![TriggerPayload {
                job_id: accepted.job_id,
                cidr: "10.0.0.0/16".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_invalid_request_creates_no_job() {
        let store = MemoryJobStore::new();
        let trigger = RecordingTrigger::default();

        let err = create_job(&store, &trigger, json!({})).await.unwrap_err();

        assert!(matches!(err, JobError::ValidationError(_)));
        assert!(trigger.payloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trigger_failure_is_reported() {
        let store = MemoryJobStore::new();
        let trigger = RecordingTrigger {
            fail: true,
            ..Default::default()
        };

        let err = create_job(&store, &trigger, json!({ "cidr": "10.0.0.0/16" }))
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::TriggerError(_)));
    }

    #[tokio::test]
    async fn test_get_job_unknown_or_malformed_id() {
        let store = MemoryJobStore::new();

        assert!(matches!(
            get_job(&store, &Uuid::new_v4().to_string()).await,
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            get_job(&store, "job-123").await,
            Err(JobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_job_store_offline() {
        let store = MemoryJobStore::new();
        store.set_offline(true);

        assert!(matches!(
            get_job(&store, &Uuid::new_v4().to_string()).await,
            Err(JobError::StoreError(_))
        ));
    }
}
