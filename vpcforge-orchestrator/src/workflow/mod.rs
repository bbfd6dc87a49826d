//! Topology Workflow
//!
//! Turns a CIDR block into a live multi-zone VPC: one internet gateway, a
//! public and a private subnet per availability zone, a single NAT gateway in
//! the first public subnet, and one route table per tier.
//!
//! A run is a fixed sequence of [`Step`]s. Each step reads identifiers that
//! earlier steps stored in the [`RunState`] and adds its own. The first
//! failing step ends the run: the job is recorded `FAILED` and the error is
//! returned. Resources created before the failure are left in place.

mod error;
mod state;
mod step;

pub use error::WorkflowError;
pub use state::RunState;
pub use step::Step;

use std::sync::Arc;

use ipnet::Ipv4Net;
use tracing::{debug, error, info, warn};
use vpcforge_core::allocator::{allocate, parse_cidr};
use vpcforge_core::domain::topology::TopologyResult;
use vpcforge_core::dto::job::{StatusUpdate, TriggerPayload};

use crate::provider::{CloudProvider, RouteTarget, Tag, WaitPolicy};
use crate::repository::{JobStore, StoreError};

/// 0.0.0.0/0
fn default_route() -> Ipv4Net {
    Ipv4Net::default()
}

/// Settings shared by every run
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub project_name: String,
    pub vpc_wait: WaitPolicy,
    pub nat_gateway_wait: WaitPolicy,
}

pub struct TopologyWorkflow {
    provider: Arc<dyn CloudProvider>,
    store: Arc<dyn JobStore>,
    config: WorkflowConfig,
}

impl TopologyWorkflow {
    pub fn new(
        provider: Arc<dyn CloudProvider>,
        store: Arc<dyn JobStore>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            provider,
            store,
            config,
        }
    }

    /// Run every step for one job
    pub async fn run(&self, payload: TriggerPayload) -> Result<TopologyResult, WorkflowError> {
        info!("Starting topology workflow for job {} ({})", payload.job_id, payload.cidr);

        let mut run = RunState::new(&payload);

        for step in Step::SEQUENCE {
            debug!("Job {}: {}", run.job_id, step);

            if let Err(err) = self.execute(step, &mut run).await {
                error!("VPC creation failed for job {} at {}: {}", run.job_id, step, err);

                if !matches!(err, WorkflowError::StatusNotRecorded { .. }) {
                    let update = StatusUpdate::failed(err.to_string());
                    if let Err(store_err) = self.record(&mut run, update).await {
                        error!(
                            "Could not record FAILED status for job {}: {}",
                            run.job_id, store_err
                        );
                    }
                }
                return Err(err);
            }
        }

        run.result
            .take()
            .ok_or(WorkflowError::MissingPrerequisite {
                step: Step::Finalize,
                needs: "the topology result",
            })
    }

    /// Run a single step against the state left by the previous ones
    pub async fn execute(&self, step: Step, run: &mut RunState) -> Result<(), WorkflowError> {
        match step {
            Step::RecordRunning => {
                if let Err(err) = self.record(run, StatusUpdate::running()).await {
                    error!("Could not record RUNNING status for job {}: {}", run.job_id, err);
                }
                Ok(())
            }
            Step::DiscoverZones => self.discover_zones(run).await,
            Step::ComputePlan => self.compute_plan(run),
            Step::CreateVpc => self.create_vpc(run).await,
            Step::CreateInternetGateway => self.create_internet_gateway(run).await,
            Step::CreatePublicRouteTable => self.create_public_route_table(run).await,
            Step::CreateSubnets => self.create_subnets(run).await,
            Step::AllocateAddress => self.allocate_address(run).await,
            Step::CreateNatGateway => self.create_nat_gateway(run).await,
            Step::CreatePrivateRouteTable => self.create_private_route_table(run).await,
            Step::AssociatePrivateSubnets => self.associate_private_subnets(run).await,
            Step::WaitNatGatewayAvailable => self.wait_nat_gateway(run).await,
            Step::CreateNatRoute => self.create_nat_route(run).await,
            Step::Finalize => self.finalize(run).await,
        }
    }

    // =============================================================================
    // Steps
    // =============================================================================

    async fn discover_zones(&self, run: &mut RunState) -> Result<(), WorkflowError> {
        let zones = self
            .provider
            .describe_availability_zones()
            .await
            .map_err(|e| WorkflowError::provider(Step::DiscoverZones, None, e))?;

        if zones.is_empty() {
            return Err(WorkflowError::NoZones);
        }

        info!("Found {} AZs: {:?}", zones.len(), zones);
        run.zones = zones;
        Ok(())
    }

    fn compute_plan(&self, run: &mut RunState) -> Result<(), WorkflowError> {
        let base = parse_cidr(&run.cidr)?;
        let plan = allocate(base, &run.zones)?;

        info!("Public subnet block: {}", plan.public_block);
        info!("Private subnet block: {}", plan.private_block);
        debug!("Per-zone subnets are /{}", plan.subnet_prefix);

        run.plan = Some(plan);
        Ok(())
    }

    async fn create_vpc(&self, run: &mut RunState) -> Result<(), WorkflowError> {
        let step = Step::CreateVpc;
        let cidr = run.plan(step)?.vpc_block;

        let vpc_id = self
            .provider
            .create_vpc(cidr)
            .await
            .map_err(|e| WorkflowError::provider(step, None, e))?;
        run.vpc_id = Some(vpc_id.clone());

        self.tag(run, &vpc_id, "VPC", step).await?;

        self.provider
            .wait_vpc_available(&vpc_id, self.config.vpc_wait)
            .await
            .map_err(|e| WorkflowError::provider(step, Some(vpc_id.as_str()), e))?;

        info!("VPC {} created.", vpc_id);
        Ok(())
    }

    async fn create_internet_gateway(&self, run: &mut RunState) -> Result<(), WorkflowError> {
        let step = Step::CreateInternetGateway;
        let vpc_id = run.vpc_id(step)?.to_string();

        let igw_id = self
            .provider
            .create_internet_gateway()
            .await
            .map_err(|e| WorkflowError::provider(step, None, e))?;
        run.internet_gateway_id = Some(igw_id.clone());

        self.tag(run, &igw_id, "IGW", step).await?;

        self.provider
            .attach_internet_gateway(&igw_id, &vpc_id)
            .await
            .map_err(|e| WorkflowError::provider(step, Some(igw_id.as_str()), e))?;

        info!("IGW {} created and attached.", igw_id);
        Ok(())
    }

    async fn create_public_route_table(&self, run: &mut RunState) -> Result<(), WorkflowError> {
        let step = Step::CreatePublicRouteTable;
        let vpc_id = run.vpc_id(step)?.to_string();
        let igw_id = run.internet_gateway_id(step)?.to_string();

        let rt_id = self
            .provider
            .create_route_table(&vpc_id)
            .await
            .map_err(|e| WorkflowError::provider(step, Some(vpc_id.as_str()), e))?;
        run.public_route_table_id = Some(rt_id.clone());

        self.tag(run, &rt_id, "Public-RT", step).await?;

        self.provider
            .create_route(&rt_id, default_route(), &RouteTarget::InternetGateway(igw_id))
            .await
            .map_err(|e| WorkflowError::provider(step, Some(rt_id.as_str()), e))?;

        info!("Public route table {} created with route to IGW.", rt_id);
        Ok(())
    }

    async fn create_subnets(&self, run: &mut RunState) -> Result<(), WorkflowError> {
        let step = Step::CreateSubnets;
        let vpc_id = run.vpc_id(step)?.to_string();
        let public_rt_id = run.public_route_table_id(step)?.to_string();
        let zones = run.plan(step)?.zones.clone();

        for (i, zone) in zones.iter().enumerate() {
            let public_id = self
                .provider
                .create_subnet(&vpc_id, zone.public, &zone.zone)
                .await
                .map_err(|e| WorkflowError::provider(step, Some(vpc_id.as_str()), e))?;
            run.public_subnet_ids.push(public_id.clone());
            if i == 0 {
                run.nat_subnet_id = Some(public_id.clone());
            }

            self.tag(run, &public_id, &format!("Public-Subnet-{}-{}", i + 1, zone.zone), step)
                .await?;

            self.provider
                .associate_route_table(&public_rt_id, &public_id)
                .await
                .map_err(|e| WorkflowError::provider(step, Some(public_id.as_str()), e))?;
            self.provider
                .enable_public_ip_on_launch(&public_id)
                .await
                .map_err(|e| WorkflowError::provider(step, Some(public_id.as_str()), e))?;

            info!("Public Subnet {} ({}) on {} created.", public_id, zone.public, zone.zone);

            let private_id = self
                .provider
                .create_subnet(&vpc_id, zone.private, &zone.zone)
                .await
                .map_err(|e| WorkflowError::provider(step, Some(vpc_id.as_str()), e))?;
            run.private_subnet_ids.push(private_id.clone());

            self.tag(run, &private_id, &format!("Private-Subnet-{}-{}", i + 1, zone.zone), step)
                .await?;

            info!("Private Subnet {} ({}) on {} created.", private_id, zone.private, zone.zone);
        }

        Ok(())
    }

    async fn allocate_address(&self, run: &mut RunState) -> Result<(), WorkflowError> {
        let allocation_id = self
            .provider
            .allocate_address()
            .await
            .map_err(|e| WorkflowError::provider(Step::AllocateAddress, None, e))?;

        info!("EIP {} allocated to the single NAT Gateway.", allocation_id);
        run.allocation_id = Some(allocation_id);
        Ok(())
    }

    async fn create_nat_gateway(&self, run: &mut RunState) -> Result<(), WorkflowError> {
        let step = Step::CreateNatGateway;
        let subnet_id = run.nat_subnet_id(step)?.to_string();
        let allocation_id = run.allocation_id(step)?.to_string();

        let nat_id = self
            .provider
            .create_nat_gateway(&subnet_id, &allocation_id)
            .await
            .map_err(|e| WorkflowError::provider(step, Some(subnet_id.as_str()), e))?;
        run.nat_gateway_id = Some(nat_id.clone());

        self.tag(run, &nat_id, "NAT-GW-Single", step).await?;

        info!("Single NAT Gateway {} creating on subnet {}...", nat_id, subnet_id);
        Ok(())
    }

    async fn create_private_route_table(&self, run: &mut RunState) -> Result<(), WorkflowError> {
        let step = Step::CreatePrivateRouteTable;
        let vpc_id = run.vpc_id(step)?.to_string();

        let rt_id = self
            .provider
            .create_route_table(&vpc_id)
            .await
            .map_err(|e| WorkflowError::provider(step, Some(vpc_id.as_str()), e))?;
        run.private_route_table_id = Some(rt_id.clone());

        self.tag(run, &rt_id, "Private-RT", step).await?;
        Ok(())
    }

    async fn associate_private_subnets(&self, run: &mut RunState) -> Result<(), WorkflowError> {
        let step = Step::AssociatePrivateSubnets;
        let rt_id = run.private_route_table_id(step)?.to_string();

        for subnet_id in &run.private_subnet_ids {
            self.provider
                .associate_route_table(&rt_id, subnet_id)
                .await
                .map_err(|e| WorkflowError::provider(step, Some(subnet_id.as_str()), e))?;
        }

        info!(
            "All {} private subnets associated on private RT {}.",
            run.private_subnet_ids.len(),
            rt_id
        );
        Ok(())
    }

    async fn wait_nat_gateway(&self, run: &mut RunState) -> Result<(), WorkflowError> {
        let nat_id = run.nat_gateway_id(Step::WaitNatGatewayAvailable)?.to_string();

        info!("Waiting NAT Gateway {} to become 'available'...", nat_id);
        self.provider
            .wait_nat_gateway_available(&nat_id, self.config.nat_gateway_wait)
            .await
            .map_err(|source| WorkflowError::NatGatewayUnavailable {
                nat_gateway_id: nat_id.clone(),
                source,
            })?;

        info!("NAT Gateway {} is 'available'.", nat_id);
        Ok(())
    }

    async fn create_nat_route(&self, run: &mut RunState) -> Result<(), WorkflowError> {
        let step = Step::CreateNatRoute;
        let rt_id = run.private_route_table_id(step)?.to_string();
        let nat_id = run.nat_gateway_id(step)?.to_string();

        self.provider
            .create_route(&rt_id, default_route(), &RouteTarget::NatGateway(nat_id.clone()))
            .await
            .map_err(|e| WorkflowError::provider(step, Some(rt_id.as_str()), e))?;

        info!("Route for NAT GW {} added on private RT {}.", nat_id, rt_id);
        Ok(())
    }

    async fn finalize(&self, run: &mut RunState) -> Result<(), WorkflowError> {
        let topology = run.topology()?;

        if let Err(source) = self.record(run, StatusUpdate::complete(topology.clone())).await {
            return Err(WorkflowError::StatusNotRecorded {
                job_id: run.job_id,
                results: Box::new(topology),
                source,
            });
        }

        info!("Job {} complete: VPC {}", run.job_id, topology.vpc_id);
        run.result = Some(topology);
        Ok(())
    }

    // =============================================================================
    // Helpers
    // =============================================================================

    /// Write a status update, refusing transitions the job may not make
    async fn record(&self, run: &mut RunState, update: StatusUpdate) -> Result<(), StoreError> {
        if !run.status.can_transition_to(update.status) {
            warn!(
                "Refusing to move job {} from {} to {}",
                run.job_id, run.status, update.status
            );
            return Ok(());
        }

        info!("Updating job {} for status {}", run.job_id, update.status);
        run.status = update.status;
        self.store.update_status(run.job_id, update).await
    }

    async fn tag(
        &self,
        run: &RunState,
        resource_id: &str,
        role: &str,
        step: Step,
    ) -> Result<(), WorkflowError> {
        let project = &self.config.project_name;
        let tags = [
            Tag::new("Name", format!("{}-{}-{}", project, run.job_id, role)),
            Tag::new("Project", project),
        ];

        self.provider
            .tag_resource(resource_id, &tags)
            .await
            .map_err(|e| WorkflowError::provider(step, Some(resource_id), e))
    }
}
