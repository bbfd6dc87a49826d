//! Job DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::JobStatus;
use crate::domain::topology::TopologyResult;

/// Request to provision a new VPC
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub cidr: String,
}

/// Response to an accepted job creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAccepted {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Fields merged into an existing job record
///
/// `None` fields leave the stored value untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: JobStatus,
    pub results: Option<TopologyResult>,
    pub error_message: Option<String>,
}

impl StatusUpdate {
    pub fn running() -> Self {
        Self {
            status: JobStatus::Running,
            results: None,
            error_message: None,
        }
    }

    pub fn complete(results: TopologyResult) -> Self {
        Self {
            status: JobStatus::Complete,
            results: Some(results),
            error_message: None,
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            results: None,
            error_message: Some(error_message.into()),
        }
    }
}

/// Message handed to the job trigger to start a workflow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub job_id: Uuid,
    pub cidr: String,
}
