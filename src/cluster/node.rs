//! Node and network records produced by the address allocator

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Role a node plays in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Management node (`ndb_mgmd`), always node id 1
    Coordinator,
    /// Storage node (`ndbd`)
    Data,
    /// Query node (`mysqld`), the only role with a host port
    Sql,
}

impl NodeRole {
    /// Section header used for this role in the topology artifact
    pub fn section(&self) -> &'static str {
        match self {
            NodeRole::Coordinator => "ndb_mgmd",
            NodeRole::Data => "ndbd",
            NodeRole::Sql => "mysqld",
        }
    }

    /// Inverse of [`NodeRole::section`]
    pub fn from_section(section: &str) -> Option<Self> {
        match section {
            "ndb_mgmd" => Some(NodeRole::Coordinator),
            "ndbd" => Some(NodeRole::Data),
            "mysqld" => Some(NodeRole::Sql),
            _ => None,
        }
    }

    /// Container name prefix; containers are named `<prefix>-<ordinal>`
    pub fn container_prefix(&self) -> &'static str {
        match self {
            NodeRole::Coordinator => "management",
            NodeRole::Data => "ndb",
            NodeRole::Sql => "mysqld",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeRole::Coordinator => "management",
            NodeRole::Data => "data",
            NodeRole::Sql => "sql",
        };
        f.write_str(name)
    }
}

/// One provisioned node. Never mutated after allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub role: NodeRole,
    pub node_id: u32,
    pub container_name: String,
    pub address: Ipv4Addr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
}

/// The private docker network every node joins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkResource {
    pub name: String,
    /// First two octets of the /16 subnet, e.g. `10.100`
    pub subnet_prefix: String,
}

impl NetworkResource {
    /// CIDR notation of the network subnet
    pub fn subnet(&self) -> String {
        format!("{}.0.0/16", self.subnet_prefix)
    }
}
