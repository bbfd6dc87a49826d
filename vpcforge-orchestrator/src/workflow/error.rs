use thiserror::Error;
use uuid::Uuid;
use vpcforge_core::allocator::AllocationError;
use vpcforge_core::domain::topology::TopologyResult;

use super::step::Step;
use crate::provider::ProviderError;
use crate::repository::StoreError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("no 'available' availability zone found")]
    NoZones,

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("{step} failed{}: {source}", on_resource(.resource))]
    Provider {
        step: Step,
        resource: Option<String>,
        source: ProviderError,
    },

    #[error("NAT gateway {nat_gateway_id} failed to become available: {source}")]
    NatGatewayUnavailable {
        nat_gateway_id: String,
        source: ProviderError,
    },

    #[error("{step} cannot run before {needs} exists")]
    MissingPrerequisite { step: Step, needs: &'static str },

    #[error("topology for job {job_id} was created but its COMPLETE status could not be recorded: {source}")]
    StatusNotRecorded {
        job_id: Uuid,
        results: Box<TopologyResult>,
        source: StoreError,
    },
}

impl WorkflowError {
    pub fn provider(step: Step, resource: Option<&str>, source: ProviderError) -> Self {
        WorkflowError::Provider {
            step,
            resource: resource.map(String::from),
            source,
        }
    }
}

fn on_resource(resource: &Option<String>) -> String {
    resource
        .as_ref()
        .map(|id| format!(" on {}", id))
        .unwrap_or_default()
}
