//! # Cluster topology and lifecycle
//!
//! Everything needed to turn a cluster shape into running containers:
//!
//! - **allocator**: node ids, container names, addresses and host ports
//! - **topology**: the `mysql-cluster.cnf` artifact every node reads at boot
//! - **manifest**: the persisted record of what `create` provisioned
//! - **orchestrator**: ordered create and best-effort delete
//!
//! ```text
//!   ClusterSpec ──► allocate ──► [NodeRecord] ──► render ──► mysql-cluster.cnf
//!                                     │
//!                                     ▼
//!                           ClusterOrchestrator ──► CommandExecutor ──► docker
//! ```

pub mod allocator;
pub mod manifest;
pub mod node;
pub mod orchestrator;
pub mod topology;

pub use allocator::{
    allocate, AddressPlan, AllocationError, ClusterSpec, DEFAULT_NETWORK_NAME,
    DEFAULT_SQL_BASE_PORT, DEFAULT_SUBNET_PREFIX, MAX_NODES_PER_ROLE,
};
pub use manifest::{ClusterManifest, ManifestError, MANIFEST_FILE};
pub use node::{NetworkResource, NodeRecord, NodeRole};
pub use orchestrator::{
    ClusterError, ClusterOrchestrator, CreateReport, LifecycleState, OrchestratorConfig, Stage,
    TeardownFailure, TeardownOutcome, TeardownReport,
};
pub use topology::{PersistenceError, TopologyEntry, TopologyParams, TopologyParseError};
