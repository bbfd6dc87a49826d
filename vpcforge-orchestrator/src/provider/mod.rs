//! Cloud Provider Interface
//!
//! The capability set the topology workflow needs from a cloud: zone
//! discovery, creation of VPC building blocks, tagging, and blocking
//! readiness waits. Implementations are injected into the workflow as
//! `Arc<dyn CloudProvider>`.

mod simulated;

pub use simulated::{Call, Operation, SimulatedProvider};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },

    #[error("resource {0} not found")]
    NotFound(String),

    #[error("timed out after {waited:?} waiting for {resource} to become available")]
    Timeout { resource: String, waited: Duration },

    #[error("{resource} entered a failed state: {reason}")]
    ResourceFailed { resource: String, reason: String },
}

impl ProviderError {
    pub fn request(operation: &'static str, message: impl Into<String>) -> Self {
        ProviderError::Request {
            operation,
            message: message.into(),
        }
    }
}

/// Lifecycle state reported by a describe call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    Pending,
    Available,
    Failed(String),
}

/// Bounds of a poll-until-available wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

/// Where a route sends its traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    InternetGateway(String),
    NatGateway(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Names of the zones currently in the `available` state, in provider order
    async fn describe_availability_zones(&self) -> Result<Vec<String>, ProviderError>;

    async fn create_vpc(&self, cidr: Ipv4Net) -> Result<String, ProviderError>;

    async fn describe_vpc(&self, vpc_id: &str) -> Result<ResourceState, ProviderError>;

    async fn create_internet_gateway(&self) -> Result<String, ProviderError>;

    async fn attach_internet_gateway(
        &self,
        internet_gateway_id: &str,
        vpc_id: &str,
    ) -> Result<(), ProviderError>;

    async fn create_route_table(&self, vpc_id: &str) -> Result<String, ProviderError>;

    async fn create_route(
        &self,
        route_table_id: &str,
        destination: Ipv4Net,
        target: &RouteTarget,
    ) -> Result<(), ProviderError>;

    async fn create_subnet(
        &self,
        vpc_id: &str,
        cidr: Ipv4Net,
        zone: &str,
    ) -> Result<String, ProviderError>;

    /// Returns the association id
    async fn associate_route_table(
        &self,
        route_table_id: &str,
        subnet_id: &str,
    ) -> Result<String, ProviderError>;

    /// Instances launched in the subnet get a public address by default
    async fn enable_public_ip_on_launch(&self, subnet_id: &str) -> Result<(), ProviderError>;

    /// Reserves a routable address, returning its allocation id
    async fn allocate_address(&self) -> Result<String, ProviderError>;

    async fn create_nat_gateway(
        &self,
        subnet_id: &str,
        allocation_id: &str,
    ) -> Result<String, ProviderError>;

    async fn describe_nat_gateway(
        &self,
        nat_gateway_id: &str,
    ) -> Result<ResourceState, ProviderError>;

    async fn tag_resource(&self, resource_id: &str, tags: &[Tag]) -> Result<(), ProviderError>;

    async fn wait_vpc_available(&self, vpc_id: &str, policy: WaitPolicy) -> Result<(), ProviderError> {
        wait_until_available(vpc_id, policy, || self.describe_vpc(vpc_id)).await
    }

    async fn wait_nat_gateway_available(
        &self,
        nat_gateway_id: &str,
        policy: WaitPolicy,
    ) -> Result<(), ProviderError> {
        wait_until_available(nat_gateway_id, policy, || {
            self.describe_nat_gateway(nat_gateway_id)
        })
        .await
    }
}

/// Poll `describe` until the resource is available, failed, or the policy times out
pub async fn wait_until_available<F, Fut>(
    resource: &str,
    policy: WaitPolicy,
    mut describe: F,
) -> Result<(), ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ResourceState, ProviderError>>,
{
    let started = tokio::time::Instant::now();

    loop {
        match describe().await? {
            ResourceState::Available => return Ok(()),
            ResourceState::Failed(reason) => {
                return Err(ProviderError::ResourceFailed {
                    resource: resource.to_string(),
                    reason,
                });
            }
            ResourceState::Pending => {}
        }

        let waited = started.elapsed();
        match waited.checked_add(policy.poll_interval) {
            Some(next) if next <= policy.timeout => {}
            _ => {
                return Err(ProviderError::Timeout {
                    resource: resource.to_string(),
                    waited,
                });
            }
        }

        tracing::debug!("{} not available yet, polling again in {:?}", resource, policy.poll_interval);
        tokio::time::sleep(policy.poll_interval).await;
    }
}
