use std::fmt;

/// Named steps of a provisioning run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    RecordRunning,
    DiscoverZones,
    ComputePlan,
    CreateVpc,
    CreateInternetGateway,
    CreatePublicRouteTable,
    CreateSubnets,
    AllocateAddress,
    CreateNatGateway,
    CreatePrivateRouteTable,
    AssociatePrivateSubnets,
    WaitNatGatewayAvailable,
    CreateNatRoute,
    Finalize,
}

impl Step {
    pub const SEQUENCE: [Step; 14] = [
        Step::RecordRunning,
        Step::DiscoverZones,
        Step::ComputePlan,
        Step::CreateVpc,
        Step::CreateInternetGateway,
        Step::CreatePublicRouteTable,
        Step::CreateSubnets,
        Step::AllocateAddress,
        Step::CreateNatGateway,
        Step::CreatePrivateRouteTable,
        Step::AssociatePrivateSubnets,
        Step::WaitNatGatewayAvailable,
        Step::CreateNatRoute,
        Step::Finalize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::RecordRunning => "record-running",
            Step::DiscoverZones => "discover-zones",
            Step::ComputePlan => "compute-plan",
            Step::CreateVpc => "create-vpc",
            Step::CreateInternetGateway => "create-internet-gateway",
            Step::CreatePublicRouteTable => "create-public-route-table",
            Step::CreateSubnets => "create-subnets",
            Step::AllocateAddress => "allocate-address",
            Step::CreateNatGateway => "create-nat-gateway",
            Step::CreatePrivateRouteTable => "create-private-route-table",
            Step::AssociatePrivateSubnets => "associate-private-subnets",
            Step::WaitNatGatewayAvailable => "wait-nat-gateway-available",
            Step::CreateNatRoute => "create-nat-route",
            Step::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
