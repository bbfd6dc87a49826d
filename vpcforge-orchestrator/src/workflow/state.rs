use uuid::Uuid;
use vpcforge_core::allocator::AddressPlan;
use vpcforge_core::domain::job::JobStatus;
use vpcforge_core::domain::topology::TopologyResult;
use vpcforge_core::dto::job::TriggerPayload;

use super::error::WorkflowError;
use super::step::Step;

/// Everything a run has learned or created so far
///
/// Identifiers only flow forward: each step reads what earlier steps stored
/// here and adds its own.
#[derive(Debug, Clone)]
pub struct RunState {
    pub job_id: Uuid,
    pub cidr: String,
    /// Status this run has moved the job to, whether or not the write landed
    pub status: JobStatus,
    pub zones: Vec<String>,
    pub plan: Option<AddressPlan>,
    pub vpc_id: Option<String>,
    pub internet_gateway_id: Option<String>,
    pub public_route_table_id: Option<String>,
    pub public_subnet_ids: Vec<String>,
    pub private_subnet_ids: Vec<String>,
    /// First public subnet; hosts the NAT gateway
    pub nat_subnet_id: Option<String>,
    pub allocation_id: Option<String>,
    pub nat_gateway_id: Option<String>,
    pub private_route_table_id: Option<String>,
    pub result: Option<TopologyResult>,
}

impl RunState {
    pub fn new(payload: &TriggerPayload) -> Self {
        Self {
            job_id: payload.job_id,
            cidr: payload.cidr.clone(),
            status: JobStatus::Pending,
            zones: Vec::new(),
            plan: None,
            vpc_id: None,
            internet_gateway_id: None,
            public_route_table_id: None,
            public_subnet_ids: Vec::new(),
            private_subnet_ids: Vec::new(),
            nat_subnet_id: None,
            allocation_id: None,
            nat_gateway_id: None,
            private_route_table_id: None,
            result: None,
        }
    }

    pub fn plan(&self, step: Step) -> Result<&AddressPlan, WorkflowError> {
        require(&self.plan, step, "the address plan")
    }

    pub fn vpc_id(&self, step: Step) -> Result<&str, WorkflowError> {
        require(&self.vpc_id, step, "the VPC").map(String::as_str)
    }

    pub fn internet_gateway_id(&self, step: Step) -> Result<&str, WorkflowError> {
        require(&self.internet_gateway_id, step, "the internet gateway").map(String::as_str)
    }

    pub fn public_route_table_id(&self, step: Step) -> Result<&str, WorkflowError> {
        require(&self.public_route_table_id, step, "the public route table").map(String::as_str)
    }

    pub fn nat_subnet_id(&self, step: Step) -> Result<&str, WorkflowError> {
        require(&self.nat_subnet_id, step, "a public subnet to host the NAT gateway")
            .map(String::as_str)
    }

    pub fn allocation_id(&self, step: Step) -> Result<&str, WorkflowError> {
        require(&self.allocation_id, step, "the elastic IP allocation").map(String::as_str)
    }

    pub fn nat_gateway_id(&self, step: Step) -> Result<&str, WorkflowError> {
        require(&self.nat_gateway_id, step, "the NAT gateway").map(String::as_str)
    }

    pub fn private_route_table_id(&self, step: Step) -> Result<&str, WorkflowError> {
        require(&self.private_route_table_id, step, "the private route table").map(String::as_str)
    }

    /// Assemble the results payload once every resource exists
    pub fn topology(&self) -> Result<TopologyResult, WorkflowError> {
        let step = Step::Finalize;
        Ok(TopologyResult {
            vpc_id: self.vpc_id(step)?.to_string(),
            internet_gateway_id: self.internet_gateway_id(step)?.to_string(),
            public_route_table_id: self.public_route_table_id(step)?.to_string(),
            public_subnet_ids: self.public_subnet_ids.clone(),
            private_subnet_ids: self.private_subnet_ids.clone(),
            private_route_table_id: self.private_route_table_id(step)?.to_string(),
            nat_gateway_id: self.nat_gateway_id(step)?.to_string(),
            elastic_ip_allocation_id: self.allocation_id(step)?.to_string(),
            availability_zones_used: self.zones.clone(),
            address_plan: self.plan(step)?.clone(),
        })
    }
}

fn require<'a, T>(
    value: &'a Option<T>,
    step: Step,
    needs: &'static str,
) -> Result<&'a T, WorkflowError> {
    value
        .as_ref()
        .ok_or(WorkflowError::MissingPrerequisite { step, needs })
}
