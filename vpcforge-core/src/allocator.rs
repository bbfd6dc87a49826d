//! Address allocation
//!
//! Splits a VPC address block into a public and a private half and carves
//! each half into one subnet per availability zone. Everything here is pure
//! and deterministic for a given block and zone list.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest subnet (largest prefix length) a zone may be given.
pub const MAX_SUBNET_PREFIX: u8 = 28;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("no availability zones to allocate subnets for")]
    NoZones,

    #[error("invalid CIDR block: {0}")]
    InvalidBlock(String),

    #[error("CIDR of VPC {0} is too small to be divided in two")]
    BlockTooSmall(Ipv4Net),

    #[error(
        "too many availability zones ({zones}) to divide the block {block}: subnets would be /{prefix}, smaller than /28"
    )]
    SubnetTooSmall { zones: usize, block: Ipv4Net, prefix: u8 },
}

/// Subnet pair assigned to one availability zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSubnets {
    pub zone: String,
    pub public: Ipv4Net,
    pub private: Ipv4Net,
}

/// Full subnet layout for one VPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPlan {
    pub vpc_block: Ipv4Net,
    pub public_block: Ipv4Net,
    pub private_block: Ipv4Net,
    pub subnet_prefix: u8,
    /// One entry per zone, in the caller's zone order
    pub zones: Vec<ZoneSubnets>,
}

impl AddressPlan {
    pub fn first_zone(&self) -> Option<&ZoneSubnets> {
        self.zones.first()
    }
}

/// Parse a CIDR string, requiring it to be in canonical network form
pub fn parse_cidr(cidr: &str) -> Result<Ipv4Net, AllocationError> {
    let net: Ipv4Net = cidr
        .trim()
        .parse()
        .map_err(|_| AllocationError::InvalidBlock(format!("'{}' is not an IPv4 CIDR", cidr)))?;

    if net.addr() != net.network() {
        return Err(AllocationError::InvalidBlock(format!(
            "{} has host bits set (did you mean {}?)",
            cidr,
            net.trunc()
        )));
    }

    Ok(net)
}

/// Number of extra prefix bits needed to give each zone its own subnet
///
/// `ceil(log2(zone_count))`, zero for a single zone.
pub fn bits_needed(zone_count: usize) -> u8 {
    (usize::BITS - zone_count.saturating_sub(1).leading_zeros()) as u8
}

/// Plan the subnets of `base` for the given zones
pub fn allocate(base: Ipv4Net, zones: &[String]) -> Result<AddressPlan, AllocationError> {
    if zones.is_empty() {
        return Err(AllocationError::NoZones);
    }

    let (public_block, private_block) = split_in_half(base)?;

    let subnet_prefix = public_block.prefix_len() as u32 + bits_needed(zones.len()) as u32;
    if subnet_prefix > MAX_SUBNET_PREFIX as u32 {
        return Err(AllocationError::SubnetTooSmall {
            zones: zones.len(),
            block: public_block,
            prefix: subnet_prefix.min(u8::MAX as u32) as u8,
        });
    }
    let subnet_prefix = subnet_prefix as u8;

    let public_subnets = carve(public_block, subnet_prefix)?;
    let private_subnets = carve(private_block, subnet_prefix)?;

    let zones = zones
        .iter()
        .zip(public_subnets.zip(private_subnets))
        .map(|(zone, (public, private))| ZoneSubnets {
            zone: zone.clone(),
            public,
            private,
        })
        .collect();

    Ok(AddressPlan {
        vpc_block: base,
        public_block,
        private_block,
        subnet_prefix,
        zones,
    })
}

fn split_in_half(base: Ipv4Net) -> Result<(Ipv4Net, Ipv4Net), AllocationError> {
    let halves: Vec<Ipv4Net> = base
        .subnets(base.prefix_len() + 1)
        .map_err(|_| AllocationError::BlockTooSmall(base))?
        .collect();

    match halves.as_slice() {
        [public, private] => Ok((*public, *private)),
        _ => Err(AllocationError::BlockTooSmall(base)),
    }
}

fn carve(
    block: Ipv4Net,
    prefix: u8,
) -> Result<impl Iterator<Item = Ipv4Net>, AllocationError> {
    block
        .subnets(prefix)
        .map_err(|e| AllocationError::InvalidBlock(format!("{}: {}", block, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    fn zones(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("us-east-1{}", (b'a' + i as u8) as char)).collect()
    }

    fn overlaps(a: &Ipv4Net, b: &Ipv4Net) -> bool {
        a.contains(&b.network()) || b.contains(&a.network())
    }

    #[test]
    fn test_bits_needed() {
        assert_eq!(bits_needed(1), 0);
        assert_eq!(bits_needed(2), 1);
        assert_eq!(bits_needed(3), 2);
        assert_eq!(bits_needed(4), 2);
        assert_eq!(bits_needed(5), 3);
        assert_eq!(bits_needed(8), 3);
        assert_eq!(bits_needed(9), 4);
    }

    #[test]
    fn test_two_zones_in_a_slash_16() {
        let plan = allocate(net("10.0.0.0/16"), &zones(2)).unwrap();

        assert_eq!(plan.public_block, net("10.0.0.0/17"));
        assert_eq!(plan.private_block, net("10.0.128.0/17"));
        assert_eq!(plan.subnet_prefix, 18);

        assert_eq!(plan.zones[0].zone, "us-east-1a");
        assert_eq!(plan.zones[0].public, net("10.0.0.0/18"));
        assert_eq!(plan.zones[0].private, net("10.0.128.0/18"));
        assert_eq!(plan.zones[1].zone, "us-east-1b");
        assert_eq!(plan.zones[1].public, net("10.0.64.0/18"));
        assert_eq!(plan.zones[1].private, net("10.0.192.0/18"));
    }

    #[test]
    fn test_single_zone_gets_whole_halves() {
        let plan = allocate(net("172.16.0.0/20"), &zones(1)).unwrap();
        assert_eq!(plan.subnet_prefix, 21);
        assert_eq!(plan.zones.len(), 1);
        assert_eq!(plan.zones[0].public, plan.public_block);
        assert_eq!(plan.zones[0].private, plan.private_block);
    }

    #[test]
    fn test_three_zones_use_four_way_split() {
        let plan = allocate(net("10.1.0.0/16"), &zones(3)).unwrap();
        assert_eq!(plan.subnet_prefix, 19);
        let publics: Vec<_> = plan.zones.iter().map(|z| z.public).collect();
        assert_eq!(
            publics,
            vec![net("10.1.0.0/19"), net("10.1.32.0/19"), net("10.1.64.0/19")]
        );
    }

    #[test]
    fn test_zone_order_is_preserved() {
        let order = vec!["zone-c".to_string(), "zone-a".to_string(), "zone-b".to_string()];
        let plan = allocate(net("10.0.0.0/16"), &order).unwrap();
        let names: Vec<_> = plan.zones.iter().map(|z| z.zone.as_str()).collect();
        assert_eq!(names, vec!["zone-c", "zone-a", "zone-b"]);
        assert_eq!(plan.first_zone().unwrap().public, net("10.0.0.0/19"));
    }

    #[test]
    fn test_plans_are_disjoint_and_contained() {
        for base in ["10.0.0.0/16", "192.168.0.0/22", "10.20.0.0/24", "100.64.0.0/12"] {
            let base = net(base);
            for n in 1..=9 {
                let Ok(plan) = allocate(base, &zones(n)) else {
                    continue;
                };
                assert_eq!(plan.zones.len(), n);
                assert!(!overlaps(&plan.public_block, &plan.private_block));
                assert!(base.contains(&plan.public_block));
                assert!(base.contains(&plan.private_block));

                for (i, a) in plan.zones.iter().enumerate() {
                    assert!(plan.public_block.contains(&a.public));
                    assert!(plan.private_block.contains(&a.private));
                    assert!(a.public.prefix_len() <= MAX_SUBNET_PREFIX);
                    for b in plan.zones.iter().skip(i + 1) {
                        assert!(!overlaps(&a.public, &b.public), "{} / {}", a.public, b.public);
                        assert!(!overlaps(&a.private, &b.private));
                    }
                }
            }
        }
    }

    #[test]
    fn test_rejects_prefix_beyond_limit() {
        // /24 -> /25 halves; 4 zones -> /27 ok, 9 zones -> /29 too small
        assert!(allocate(net("10.0.0.0/24"), &zones(4)).is_ok());
        assert_eq!(
            allocate(net("10.0.0.0/24"), &zones(9)),
            Err(AllocationError::SubnetTooSmall {
                zones: 9,
                block: net("10.0.0.0/25"),
                prefix: 29,
            })
        );
    }

    #[test]
    fn test_slash_30_never_allocates() {
        for n in 1..=6 {
            let err = allocate(net("10.0.0.0/30"), &zones(n)).unwrap_err();
            assert!(matches!(err, AllocationError::SubnetTooSmall { .. }), "{:?}", err);
        }
    }

    #[test]
    fn test_slash_32_cannot_be_split() {
        assert_eq!(
            allocate(net("10.0.0.1/32"), &zones(1)),
            Err(AllocationError::BlockTooSmall(net("10.0.0.1/32")))
        );
    }

    #[test]
    fn test_no_zones() {
        assert_eq!(allocate(net("10.0.0.0/16"), &[]), Err(AllocationError::NoZones));
    }

    #[test]
    fn test_parse_cidr() {
        assert_eq!(parse_cidr(" 10.0.0.0/16 ").unwrap(), net("10.0.0.0/16"));
        assert!(matches!(parse_cidr("10.0.0.1/16"), Err(AllocationError::InvalidBlock(_))));
        assert!(matches!(parse_cidr("10.0.0.0"), Err(AllocationError::InvalidBlock(_))));
        assert!(matches!(parse_cidr("banana"), Err(AllocationError::InvalidBlock(_))));
        assert!(matches!(parse_cidr("10.0.0.0/33"), Err(AllocationError::InvalidBlock(_))));
    }
}
