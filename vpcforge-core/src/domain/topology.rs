//! Provisioned topology
//!
//! Identifiers of everything a successful run created, stored as the job's
//! results payload.

use serde::{Deserialize, Serialize};

use crate::allocator::AddressPlan;

/// Result of a completed provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyResult {
    pub vpc_id: String,
    pub internet_gateway_id: String,
    pub public_route_table_id: String,
    pub public_subnet_ids: Vec<String>,
    pub private_subnet_ids: Vec<String>,
    pub private_route_table_id: String,
    pub nat_gateway_id: String,
    pub elastic_ip_allocation_id: String,
    pub availability_zones_used: Vec<String>,
    pub address_plan: AddressPlan,
}
