//! Address allocation
//!
//! Derives node ids, container names, addresses and host ports from the
//! cluster shape. Allocation is a pure function of its inputs: the create and
//! delete paths both call it and must agree on every name it produces.
//!
//! Layout inside the `/16` network, with `d` data and `s` query nodes:
//!
//! ```text
//! role         node id        address           host port
//! management   1              <prefix>.0.2      -
//! data i       1 + i          <prefix>.1.(i+1)  -
//! sql j        1 + d + j      <prefix>.2.(j+1)  base + j
//! ```

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::node::{NetworkResource, NodeRecord, NodeRole};

/// Largest node count per role; ordinals map to host octets `.2` to `.254`
pub const MAX_NODES_PER_ROLE: u32 = 253;

/// Default docker network name
pub const DEFAULT_NETWORK_NAME: &str = "mysql-cluster";

/// Default first two octets of the network subnet
pub const DEFAULT_SUBNET_PREFIX: &str = "10.100";

/// Query node `j` is published on host port `base + j`
pub const DEFAULT_SQL_BASE_PORT: u16 = 3306;

const COORDINATOR_RANGE: u8 = 0;
const DATA_RANGE: u8 = 1;
const SQL_RANGE: u8 = 2;
const COORDINATOR_HOST: u8 = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("{role} node count must not be negative (got {count})")]
    NegativeCount { role: NodeRole, count: i64 },

    #[error("{role} node count {count} exceeds the per-role limit of {MAX_NODES_PER_ROLE}")]
    TooManyNodes { role: NodeRole, count: i64 },

    #[error("invalid subnet prefix '{0}': expected two octets such as 10.100")]
    InvalidPrefix(String),

    #[error("host port range starting at {base} cannot fit {count} query nodes")]
    PortRange { base: u16, count: u32 },
}

/// Requested cluster shape. Built through [`ClusterSpec::new`] or
/// deserialized through the same checks, so counts are always within bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ClusterShape")]
pub struct ClusterSpec {
    data_nodes: u32,
    sql_nodes: u32,
}

/// Unchecked wire form of [`ClusterSpec`]
#[derive(Deserialize)]
struct ClusterShape {
    data_nodes: i64,
    sql_nodes: i64,
}

impl TryFrom<ClusterShape> for ClusterSpec {
    type Error = AllocationError;

    fn try_from(shape: ClusterShape) -> Result<Self, Self::Error> {
        ClusterSpec::new(shape.data_nodes, shape.sql_nodes)
    }
}

impl ClusterSpec {
    pub fn new(data_nodes: i64, sql_nodes: i64) -> Result<Self, AllocationError> {
        Ok(Self {
            data_nodes: check_count(NodeRole::Data, data_nodes)?,
            sql_nodes: check_count(NodeRole::Sql, sql_nodes)?,
        })
    }

    pub fn data_nodes(&self) -> u32 {
        self.data_nodes
    }

    pub fn sql_nodes(&self) -> u32 {
        self.sql_nodes
    }

    /// Total nodes including the management node
    pub fn node_count(&self) -> usize {
        1 + self.data_nodes as usize + self.sql_nodes as usize
    }
}

fn check_count(role: NodeRole, count: i64) -> Result<u32, AllocationError> {
    if count < 0 {
        return Err(AllocationError::NegativeCount { role, count });
    }
    if count > MAX_NODES_PER_ROLE as i64 {
        return Err(AllocationError::TooManyNodes { role, count });
    }
    Ok(count as u32)
}

/// Network naming and port conventions the allocator applies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPlan {
    pub network_name: String,
    prefix: [u8; 2],
    pub sql_base_port: u16,
}

impl AddressPlan {
    pub fn new(
        network_name: impl Into<String>,
        subnet_prefix: &str,
        sql_base_port: u16,
    ) -> Result<Self, AllocationError> {
        Ok(Self {
            network_name: network_name.into(),
            prefix: parse_prefix(subnet_prefix)?,
            sql_base_port,
        })
    }

    pub fn subnet_prefix(&self) -> String {
        format!("{}.{}", self.prefix[0], self.prefix[1])
    }

    fn address(&self, range: u8, host: u8) -> Ipv4Addr {
        Ipv4Addr::new(self.prefix[0], self.prefix[1], range, host)
    }

    /// Well-known management node address
    pub fn coordinator_address(&self) -> Ipv4Addr {
        self.address(COORDINATOR_RANGE, COORDINATOR_HOST)
    }
}

impl Default for AddressPlan {
    fn default() -> Self {
        Self {
            network_name: DEFAULT_NETWORK_NAME.to_string(),
            prefix: [10, 100],
            sql_base_port: DEFAULT_SQL_BASE_PORT,
        }
    }
}

fn parse_prefix(prefix: &str) -> Result<[u8; 2], AllocationError> {
    let invalid = || AllocationError::InvalidPrefix(prefix.to_string());
    let mut octets = prefix.trim().trim_end_matches('.').split('.');
    let first = octets.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let second = octets.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    if octets.next().is_some() {
        return Err(invalid());
    }
    Ok([first, second])
}

/// Allocate the network and every node record for `spec`.
///
/// Records come back in creation order: management node, data nodes, query
/// nodes. Node ids are one sequence across all roles.
pub fn allocate(
    spec: &ClusterSpec,
    plan: &AddressPlan,
) -> Result<(NetworkResource, Vec<NodeRecord>), AllocationError> {
    check_count(NodeRole::Data, spec.data_nodes as i64)?;
    check_count(NodeRole::Sql, spec.sql_nodes as i64)?;
    if plan.sql_base_port as u32 + spec.sql_nodes > u16::MAX as u32 {
        return Err(AllocationError::PortRange {
            base: plan.sql_base_port,
            count: spec.sql_nodes,
        });
    }

    let network = NetworkResource {
        name: plan.network_name.clone(),
        subnet_prefix: plan.subnet_prefix(),
    };

    let mut nodes = Vec::with_capacity(spec.node_count());
    let mut next_id = 1u32;

    nodes.push(NodeRecord {
        role: NodeRole::Coordinator,
        node_id: next_id,
        container_name: format!("{}-1", NodeRole::Coordinator.container_prefix()),
        address: plan.coordinator_address(),
        host_port: None,
    });

    for ordinal in 1..=spec.data_nodes {
        next_id += 1;
        nodes.push(NodeRecord {
            role: NodeRole::Data,
            node_id: next_id,
            container_name: format!("{}-{}", NodeRole::Data.container_prefix(), ordinal),
            address: plan.address(DATA_RANGE, (ordinal + 1) as u8),
            host_port: None,
        });
    }

    for ordinal in 1..=spec.sql_nodes {
        next_id += 1;
        nodes.push(NodeRecord {
            role: NodeRole::Sql,
            node_id: next_id,
            container_name: format!("{}-{}", NodeRole::Sql.container_prefix(), ordinal),
            address: plan.address(SQL_RANGE, (ordinal + 1) as u8),
            host_port: Some(plan.sql_base_port + ordinal as u16),
        });
    }

    Ok((network, nodes))
}
