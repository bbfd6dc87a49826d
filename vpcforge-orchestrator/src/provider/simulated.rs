//! Simulated cloud provider
//!
//! In-memory, deterministic stand-in for a real cloud. It keeps enough state
//! to reject calls a real provider would reject (unknown references,
//! overlapping subnets, double associations, routes to NAT gateways that are
//! not available yet). With `with_call_log` it also records every call so
//! tests can assert on the exact sequence a workflow issued.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use ipnet::Ipv4Net;

use super::{CloudProvider, ProviderError, ResourceState, RouteTarget, Tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DescribeAvailabilityZones,
    CreateVpc,
    DescribeVpc,
    CreateInternetGateway,
    AttachInternetGateway,
    CreateRouteTable,
    CreateRoute,
    CreateSubnet,
    AssociateRouteTable,
    EnablePublicIpOnLaunch,
    AllocateAddress,
    CreateNatGateway,
    DescribeNatGateway,
    TagResource,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::DescribeAvailabilityZones => "describe_availability_zones",
            Operation::CreateVpc => "create_vpc",
            Operation::DescribeVpc => "describe_vpc",
            Operation::CreateInternetGateway => "create_internet_gateway",
            Operation::AttachInternetGateway => "attach_internet_gateway",
            Operation::CreateRouteTable => "create_route_table",
            Operation::CreateRoute => "create_route",
            Operation::CreateSubnet => "create_subnet",
            Operation::AssociateRouteTable => "associate_route_table",
            Operation::EnablePublicIpOnLaunch => "enable_public_ip_on_launch",
            Operation::AllocateAddress => "allocate_address",
            Operation::CreateNatGateway => "create_nat_gateway",
            Operation::DescribeNatGateway => "describe_nat_gateway",
            Operation::TagResource => "tag_resource",
        }
    }
}

/// One recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub target: String,
}

struct Pollable {
    polls_remaining: u32,
}

impl Pollable {
    fn poll(&mut self, stuck: bool) -> ResourceState {
        if stuck {
            return ResourceState::Pending;
        }
        if self.polls_remaining == 0 {
            ResourceState::Available
        } else {
            self.polls_remaining -= 1;
            ResourceState::Pending
        }
    }
}

struct VpcRecord {
    cidr: Ipv4Net,
    readiness: Pollable,
}

struct SubnetRecord {
    vpc_id: String,
    cidr: Ipv4Net,
    public_ip_on_launch: bool,
}

struct RouteTableRecord {
    vpc_id: String,
    routes: Vec<(Ipv4Net, RouteTarget)>,
}

struct NatGatewayRecord {
    subnet_id: String,
    readiness: Pollable,
    available: bool,
}

#[derive(Default)]
struct SimState {
    next_id: u64,
    calls: Vec<Call>,
    attempts: HashMap<Operation, usize>,
    vpcs: HashMap<String, VpcRecord>,
    internet_gateways: HashMap<String, Option<String>>,
    route_tables: HashMap<String, RouteTableRecord>,
    subnets: HashMap<String, SubnetRecord>,
    associations: HashMap<String, String>,
    addresses: HashSet<String>,
    nat_gateways: HashMap<String, NatGatewayRecord>,
    tags: HashMap<String, Vec<Tag>>,
}

impl SimState {
    fn mint(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:08x}", prefix, self.next_id)
    }

    fn vpc(&self, vpc_id: &str) -> Result<&VpcRecord, ProviderError> {
        self.vpcs
            .get(vpc_id)
            .ok_or_else(|| ProviderError::NotFound(vpc_id.to_string()))
    }

    fn subnet(&self, subnet_id: &str) -> Result<&SubnetRecord, ProviderError> {
        self.subnets
            .get(subnet_id)
            .ok_or_else(|| ProviderError::NotFound(subnet_id.to_string()))
    }

    fn exists(&self, resource_id: &str) -> bool {
        self.vpcs.contains_key(resource_id)
            || self.internet_gateways.contains_key(resource_id)
            || self.route_tables.contains_key(resource_id)
            || self.subnets.contains_key(resource_id)
            || self.addresses.contains(resource_id)
            || self.nat_gateways.contains_key(resource_id)
    }
}

pub struct SimulatedProvider {
    zones: Vec<String>,
    unavailable_zones: HashSet<String>,
    polls_until_available: u32,
    stuck_vpcs: bool,
    stuck_nat_gateways: bool,
    record_calls: bool,
    failing: HashSet<Operation>,
    failing_calls: HashMap<Operation, usize>,
    state: Mutex<SimState>,
}

impl SimulatedProvider {
    pub fn new(zones: Vec<String>) -> Self {
        Self {
            zones,
            unavailable_zones: HashSet::new(),
            polls_until_available: 1,
            stuck_vpcs: false,
            stuck_nat_gateways: false,
            record_calls: false,
            failing: HashSet::new(),
            failing_calls: HashMap::new(),
            state: Mutex::new(SimState::default()),
        }
    }

    /// Number of describe calls that report `Pending` before a VPC or NAT
    /// gateway turns available
    pub fn with_polls_until_available(mut self, polls: u32) -> Self {
        self.polls_until_available = polls;
        self
    }

    /// Every call of `operation` fails with a request error
    pub fn failing_on(mut self, operation: Operation) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Only the `nth` call of `operation` fails, counting from 1
    pub fn failing_on_call(mut self, operation: Operation, nth: usize) -> Self {
        self.failing_calls.insert(operation, nth);
        self
    }

    /// VPCs never leave `Pending`
    pub fn with_stuck_vpcs(mut self) -> Self {
        self.stuck_vpcs = true;
        self
    }

    /// NAT gateways never leave `Pending`
    pub fn with_stuck_nat_gateways(mut self) -> Self {
        self.stuck_nat_gateways = true;
        self
    }

    /// The zone stays known but is no longer reported as available
    pub fn with_unavailable_zone(mut self, zone: impl Into<String>) -> Self {
        self.unavailable_zones.insert(zone.into());
        self
    }

    /// Keep a log of every call for `calls`, `operations` and `count`
    pub fn with_call_log(mut self) -> Self {
        self.record_calls = true;
        self
    }

    // =============================================================================
    // Inspection
    // =============================================================================

    pub fn calls(&self) -> Vec<Call> {
        self.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.calls().into_iter().map(|c| c.operation).collect()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn routes(&self, route_table_id: &str) -> Vec<(Ipv4Net, RouteTarget)> {
        self.lock()
            .ok()
            .and_then(|s| s.route_tables.get(route_table_id).map(|rt| rt.routes.clone()))
            .unwrap_or_default()
    }

    /// Subnets explicitly associated with the route table, sorted
    pub fn associated_subnets(&self, route_table_id: &str) -> Vec<String> {
        let mut subnets: Vec<String> = self
            .lock()
            .map(|s| {
                s.associations
                    .iter()
                    .filter(|(_, rt)| rt.as_str() == route_table_id)
                    .map(|(subnet, _)| subnet.clone())
                    .collect()
            })
            .unwrap_or_default();
        subnets.sort();
        subnets
    }

    pub fn public_ip_on_launch(&self, subnet_id: &str) -> Option<bool> {
        self.lock()
            .ok()
            .and_then(|s| s.subnets.get(subnet_id).map(|r| r.public_ip_on_launch))
    }

    pub fn subnet_cidr(&self, subnet_id: &str) -> Option<Ipv4Net> {
        self.lock()
            .ok()
            .and_then(|s| s.subnets.get(subnet_id).map(|r| r.cidr))
    }

    pub fn nat_gateway_subnet(&self, nat_gateway_id: &str) -> Option<String> {
        self.lock()
            .ok()
            .and_then(|s| s.nat_gateways.get(nat_gateway_id).map(|n| n.subnet_id.clone()))
    }

    pub fn tags(&self, resource_id: &str) -> Vec<Tag> {
        self.lock()
            .ok()
            .and_then(|s| s.tags.get(resource_id).cloned())
            .unwrap_or_default()
    }

    // =============================================================================
    // Helpers
    // =============================================================================

    fn lock(&self) -> Result<MutexGuard<'_, SimState>, ProviderError> {
        self.state
            .lock()
            .map_err(|_| ProviderError::request("simulator", "state lock poisoned"))
    }

    fn is_available(&self, zone: &str) -> bool {
        self.zones.iter().any(|z| z == zone) && !self.unavailable_zones.contains(zone)
    }

    /// Count the call, log it when enabled and apply failure injection
    fn begin(
        &self,
        operation: Operation,
        target: &str,
    ) -> Result<MutexGuard<'_, SimState>, ProviderError> {
        let mut state = self.lock()?;
        let attempt = state.attempts.entry(operation).or_default();
        *attempt += 1;
        let attempt = *attempt;

        if self.record_calls {
            state.calls.push(Call {
                operation,
                target: target.to_string(),
            });
        }

        if self.failing.contains(&operation) || self.failing_calls.get(&operation) == Some(&attempt) {
            return Err(ProviderError::request(
                operation.name(),
                format!("injected failure for {}", target),
            ));
        }

        Ok(state)
    }
}

#[async_trait]
impl CloudProvider for SimulatedProvider {
    async fn describe_availability_zones(&self) -> Result<Vec<String>, ProviderError> {
        let _state = self.begin(Operation::DescribeAvailabilityZones, "")?;
        Ok(self
            .zones
            .iter()
            .filter(|zone| self.is_available(zone))
            .cloned()
            .collect())
    }

    async fn create_vpc(&self, cidr: Ipv4Net) -> Result<String, ProviderError> {
        let mut state = self.begin(Operation::CreateVpc, &cidr.to_string())?;
        let id = state.mint("vpc");
        state.vpcs.insert(
            id.clone(),
            VpcRecord {
                cidr,
                readiness: Pollable {
                    polls_remaining: self.polls_until_available,
                },
            },
        );
        Ok(id)
    }

    async fn describe_vpc(&self, vpc_id: &str) -> Result<ResourceState, ProviderError> {
        let mut state = self.begin(Operation::DescribeVpc, vpc_id)?;
        let vpc = state
            .vpcs
            .get_mut(vpc_id)
            .ok_or_else(|| ProviderError::NotFound(vpc_id.to_string()))?;
        Ok(vpc.readiness.poll(self.stuck_vpcs))
    }

    async fn create_internet_gateway(&self) -> Result<String, ProviderError> {
        let mut state = self.begin(Operation::CreateInternetGateway, "")?;
        let id = state.mint("igw");
        state.internet_gateways.insert(id.clone(), None);
        Ok(id)
    }

    async fn attach_internet_gateway(
        &self,
        internet_gateway_id: &str,
        vpc_id: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.begin(Operation::AttachInternetGateway, internet_gateway_id)?;
        state.vpc(vpc_id)?;

        let attachment = state
            .internet_gateways
            .get_mut(internet_gateway_id)
            .ok_or_else(|| ProviderError::NotFound(internet_gateway_id.to_string()))?;
        if let Some(existing) = attachment {
            return Err(ProviderError::request(
                Operation::AttachInternetGateway.name(),
                format!("{} is already attached to {}", internet_gateway_id, existing),
            ));
        }
        *attachment = Some(vpc_id.to_string());
        Ok(())
    }

    async fn create_route_table(&self, vpc_id: &str) -> Result<String, ProviderError> {
        let mut state = self.begin(Operation::CreateRouteTable, vpc_id)?;
        state.vpc(vpc_id)?;
        let id = state.mint("rtb");
        state.route_tables.insert(
            id.clone(),
            RouteTableRecord {
                vpc_id: vpc_id.to_string(),
                routes: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn create_route(
        &self,
        route_table_id: &str,
        destination: Ipv4Net,
        target: &RouteTarget,
    ) -> Result<(), ProviderError> {
        let op = Operation::CreateRoute;
        let mut state = self.begin(op, route_table_id)?;

        let vpc_id = state
            .route_tables
            .get(route_table_id)
            .map(|rt| rt.vpc_id.clone())
            .ok_or_else(|| ProviderError::NotFound(route_table_id.to_string()))?;

        match target {
            RouteTarget::InternetGateway(id) => match state.internet_gateways.get(id) {
                Some(Some(attached)) if *attached == vpc_id => {}
                Some(_) => {
                    return Err(ProviderError::request(
                        op.name(),
                        format!("{} is not attached to {}", id, vpc_id),
                    ));
                }
                None => return Err(ProviderError::NotFound(id.clone())),
            },
            RouteTarget::NatGateway(id) => match state.nat_gateways.get(id) {
                Some(nat) if nat.available => {}
                Some(_) => {
                    return Err(ProviderError::request(
                        op.name(),
                        format!("{} is not available", id),
                    ));
                }
                None => return Err(ProviderError::NotFound(id.clone())),
            },
        }

        let table = state
            .route_tables
            .get_mut(route_table_id)
            .ok_or_else(|| ProviderError::NotFound(route_table_id.to_string()))?;
        if table.routes.iter().any(|(dest, _)| *dest == destination) {
            return Err(ProviderError::request(
                op.name(),
                format!("route to {} already exists in {}", destination, route_table_id),
            ));
        }
        table.routes.push((destination, target.clone()));
        Ok(())
    }

    async fn create_subnet(
        &self,
        vpc_id: &str,
        cidr: Ipv4Net,
        zone: &str,
    ) -> Result<String, ProviderError> {
        let op = Operation::CreateSubnet;
        let mut state = self.begin(op, &format!("{} {}", cidr, zone))?;

        if !self.is_available(zone) {
            return Err(ProviderError::request(
                op.name(),
                format!("zone {} is not available", zone),
            ));
        }

        let vpc_cidr = state.vpc(vpc_id)?.cidr;
        if !vpc_cidr.contains(&cidr) {
            return Err(ProviderError::request(
                op.name(),
                format!("{} is outside the VPC range {}", cidr, vpc_cidr),
            ));
        }

        let conflict = state.subnets.values().find(|s| {
            s.vpc_id == vpc_id && (s.cidr.contains(&cidr.network()) || cidr.contains(&s.cidr.network()))
        });
        if let Some(existing) = conflict {
            return Err(ProviderError::request(
                op.name(),
                format!("{} conflicts with existing subnet {}", cidr, existing.cidr),
            ));
        }

        let id = state.mint("subnet");
        state.subnets.insert(
            id.clone(),
            SubnetRecord {
                vpc_id: vpc_id.to_string(),
                cidr,
                public_ip_on_launch: false,
            },
        );
        Ok(id)
    }

    async fn associate_route_table(
        &self,
        route_table_id: &str,
        subnet_id: &str,
    ) -> Result<String, ProviderError> {
        let op = Operation::AssociateRouteTable;
        let mut state = self.begin(op, subnet_id)?;

        let subnet_vpc = state.subnet(subnet_id)?.vpc_id.clone();
        let table_vpc = state
            .route_tables
            .get(route_table_id)
            .map(|rt| rt.vpc_id.clone())
            .ok_or_else(|| ProviderError::NotFound(route_table_id.to_string()))?;

        if subnet_vpc != table_vpc {
            return Err(ProviderError::request(
                op.name(),
                format!("{} and {} belong to different VPCs", route_table_id, subnet_id),
            ));
        }
        if let Some(existing) = state.associations.get(subnet_id) {
            return Err(ProviderError::request(
                op.name(),
                format!("{} is already associated with {}", subnet_id, existing),
            ));
        }

        state
            .associations
            .insert(subnet_id.to_string(), route_table_id.to_string());
        Ok(state.mint("rtbassoc"))
    }

    async fn enable_public_ip_on_launch(&self, subnet_id: &str) -> Result<(), ProviderError> {
        let mut state = self.begin(Operation::EnablePublicIpOnLaunch, subnet_id)?;
        let subnet = state
            .subnets
            .get_mut(subnet_id)
            .ok_or_else(|| ProviderError::NotFound(subnet_id.to_string()))?;
        subnet.public_ip_on_launch = true;
        Ok(())
    }

    async fn allocate_address(&self) -> Result<String, ProviderError> {
        let mut state = self.begin(Operation::AllocateAddress, "")?;
        let id = state.mint("eipalloc");
        state.addresses.insert(id.clone());
        Ok(id)
    }

    async fn create_nat_gateway(
        &self,
        subnet_id: &str,
        allocation_id: &str,
    ) -> Result<String, ProviderError> {
        let op = Operation::CreateNatGateway;
        let mut state = self.begin(op, subnet_id)?;

        state.subnet(subnet_id)?;
        if !state.addresses.contains(allocation_id) {
            return Err(ProviderError::NotFound(allocation_id.to_string()));
        }

        let id = state.mint("nat");
        state.nat_gateways.insert(
            id.clone(),
            NatGatewayRecord {
                subnet_id: subnet_id.to_string(),
                readiness: Pollable {
                    polls_remaining: self.polls_until_available,
                },
                available: false,
            },
        );
        Ok(id)
    }

    async fn describe_nat_gateway(
        &self,
        nat_gateway_id: &str,
    ) -> Result<ResourceState, ProviderError> {
        let mut state = self.begin(Operation::DescribeNatGateway, nat_gateway_id)?;
        let nat = state
            .nat_gateways
            .get_mut(nat_gateway_id)
            .ok_or_else(|| ProviderError::NotFound(nat_gateway_id.to_string()))?;

        let readiness = nat.readiness.poll(self.stuck_nat_gateways);
        if readiness == ResourceState::Available {
            nat.available = true;
        }
        Ok(readiness)
    }

    async fn tag_resource(&self, resource_id: &str, tags: &[Tag]) -> Result<(), ProviderError> {
        let mut state = self.begin(Operation::TagResource, resource_id)?;
        if !state.exists(resource_id) {
            return Err(ProviderError::NotFound(resource_id.to_string()));
        }

        let existing = state.tags.entry(resource_id.to_string()).or_default();
        for tag in tags {
            existing.retain(|t| t.key != tag.key);
            existing.push(tag.clone());
        }
        Ok(())
    }
}
