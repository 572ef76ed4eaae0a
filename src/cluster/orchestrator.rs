//! Cluster lifecycle orchestrator
//!
//! Drives a cluster through its lifecycle:
//!
//! ```text
//! create:  Absent -> NetworkCreated -> CoordinatorRunning -> DataNodesRunning
//!                 -> SqlNodesRunning -> Ready
//! delete:  Ready -> SqlNodesStopped -> DataNodesStopped -> CoordinatorStopped
//!                -> NetworkRemoved -> Absent
//! ```
//!
//! Create is fail-fast: the first failing command ends the run and nothing
//! from a later stage is attempted. Resources already created stay in place
//! for `delete` to clean up. Delete is best-effort: every container is
//! attempted and the network is always attempted last.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::allocator::{allocate, AddressPlan, AllocationError, ClusterSpec};
use super::manifest::{ClusterManifest, MANIFEST_FILE};
use super::node::{NetworkResource, NodeRecord, NodeRole};
use super::topology::{self, PersistenceError, TopologyParams};
use crate::runtime::docker::{self, RunContext};
use crate::runtime::{CommandExecutor, CommandSpec, ExecutionError};

/// File name of the rendered topology artifact inside `<config_dir>/mysql`
pub const CLUSTER_CNF_FILE: &str = "mysql-cluster.cnf";

/// File name of the management node's `my.cnf` inside `<config_dir>/mysql`
pub const MY_CNF_FILE: &str = "my.cnf";

/// Where the cluster sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Absent,
    NetworkCreated,
    CoordinatorRunning,
    DataNodesRunning,
    SqlNodesRunning,
    Ready,
    SqlNodesStopped,
    DataNodesStopped,
    CoordinatorStopped,
    NetworkRemoved,
}

/// A create-path stage; each one runs only after the previous completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Network,
    Coordinator,
    DataNodes,
    SqlNodes,
}

impl Stage {
    /// State reached when every command of this stage succeeded
    pub fn completes_to(&self) -> LifecycleState {
        match self {
            Stage::Network => LifecycleState::NetworkCreated,
            Stage::Coordinator => LifecycleState::CoordinatorRunning,
            Stage::DataNodes => LifecycleState::DataNodesRunning,
            Stage::SqlNodes => LifecycleState::SqlNodesRunning,
        }
    }

    fn for_role(role: NodeRole) -> Self {
        match role {
            NodeRole::Coordinator => Stage::Coordinator,
            NodeRole::Data => Stage::DataNodes,
            NodeRole::Sql => Stage::SqlNodes,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Network => "network",
            Stage::Coordinator => "management-node",
            Stage::DataNodes => "data-node",
            Stage::SqlNodes => "sql-node",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("invalid cluster shape: {0}")]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("a cluster is already recorded in {}; delete it before creating another", .manifest.display())]
    AlreadyProvisioned { manifest: PathBuf },

    #[error("allocation produced no management node")]
    MissingCoordinator,

    #[error(
        "{stage} stage failed on '{resource}' (containers already started: {}): {source}",
        format_started(.started)
    )]
    StageFailed {
        stage: Stage,
        resource: String,
        started: Vec<String>,
        #[source]
        source: ExecutionError,
    },
}

fn coordinator_of(nodes: &[NodeRecord]) -> Result<&NodeRecord, ClusterError> {
    nodes
        .iter()
        .find(|n| n.role == NodeRole::Coordinator)
        .ok_or(ClusterError::MissingCoordinator)
}

fn format_started(started: &[String]) -> String {
    if started.is_empty() {
        "none".to_string()
    } else {
        started.join(", ")
    }
}

/// Settings the orchestrator needs beyond the cluster shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub plan: AddressPlan,
    pub topology: TopologyParams,
    pub image: String,
    /// Absolute directory holding `mysql/` artifacts and the manifest
    pub config_dir: PathBuf,
}

impl OrchestratorConfig {
    pub fn cluster_cnf_path(&self) -> PathBuf {
        self.config_dir.join("mysql").join(CLUSTER_CNF_FILE)
    }

    pub fn my_cnf_path(&self) -> PathBuf {
        self.config_dir.join("mysql").join(MY_CNF_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.config_dir.join(MANIFEST_FILE)
    }

    fn run_context(&self) -> RunContext {
        RunContext {
            image: self.image.clone(),
            cluster_cnf: self.cluster_cnf_path(),
            my_cnf: self.my_cnf_path(),
        }
    }
}

/// Outcome of a successful create
#[derive(Debug, Clone)]
pub struct CreateReport {
    pub network: NetworkResource,
    pub nodes: Vec<NodeRecord>,
    pub artifact_path: PathBuf,
}

/// What teardown did with one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    Removed,
    AlreadyAbsent,
    Failed,
}

/// A teardown command that failed for a reason other than a missing resource
#[derive(Debug)]
pub struct TeardownFailure {
    pub resource: String,
    pub action: &'static str,
    pub error: ExecutionError,
}

/// Aggregated result of a best-effort delete
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub containers: Vec<(String, TeardownOutcome)>,
    pub network: Option<(String, TeardownOutcome)>,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    /// True when every resource ended up removed or already absent
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn count(&self, outcome: TeardownOutcome) -> usize {
        self.containers.iter().filter(|(_, o)| *o == outcome).count()
    }
}

/// Sequences container-runtime commands for one cluster
pub struct ClusterOrchestrator<E: CommandExecutor> {
    executor: E,
    config: OrchestratorConfig,
    state: LifecycleState,
}

impl<E: CommandExecutor> ClusterOrchestrator<E> {
    pub fn new(executor: E, config: OrchestratorConfig) -> Self {
        Self {
            executor,
            config,
            state: LifecycleState::Absent,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn transition(&mut self, next: LifecycleState) {
        debug!("Cluster state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    // ========================================================================
    // Create path
    // ========================================================================

    /// Provision the cluster described by `spec`.
    ///
    /// Allocation and artifact persistence happen before any container
    /// command, so their errors leave nothing behind. An existing manifest
    /// means a cluster is already recorded; it is left untouched and create
    /// is refused.
    pub async fn create(&mut self, spec: &ClusterSpec) -> Result<CreateReport, ClusterError> {
        let (network, nodes) = allocate(spec, &self.config.plan)?;
        let coordinator = coordinator_of(&nodes)?.clone();

        let manifest = self.config.manifest_path();
        if manifest.exists() {
            return Err(ClusterError::AlreadyProvisioned { manifest });
        }

        info!(
            "Creating cluster on network {} ({}) with {} data and {} sql nodes",
            network.name,
            network.subnet(),
            spec.data_nodes(),
            spec.sql_nodes()
        );

        let artifact_path = self.persist_artifacts(spec, &network, &nodes, &coordinator)?;

        let ctx = self.config.run_context();
        let mut started: Vec<String> = Vec::new();

        self.run_step(
            Stage::Network,
            &network.name,
            docker::network_create(&network),
            &started,
        )
        .await?;
        self.transition(Stage::Network.completes_to());

        for role in [NodeRole::Coordinator, NodeRole::Data, NodeRole::Sql] {
            let stage = Stage::for_role(role);
            for node in nodes.iter().filter(|n| n.role == role) {
                let command = docker::run_node(node, &network, &coordinator, &ctx);
                self.run_step(stage, &node.container_name, command, &started)
                    .await?;
                info!(
                    "Started {} node {} (id {}) at {}",
                    node.role, node.container_name, node.node_id, node.address
                );
                started.push(node.container_name.clone());
            }
            self.transition(stage.completes_to());
        }

        self.transition(LifecycleState::Ready);
        info!("Cluster ready: {} containers running", started.len());

        Ok(CreateReport {
            network,
            nodes,
            artifact_path,
        })
    }

    /// Write the topology artifact, `my.cnf` and the manifest
    fn persist_artifacts(
        &self,
        spec: &ClusterSpec,
        network: &NetworkResource,
        nodes: &[NodeRecord],
        coordinator: &NodeRecord,
    ) -> Result<PathBuf, PersistenceError> {
        let artifact_path = self.config.cluster_cnf_path();
        let content = topology::render(network, nodes, &self.config.topology);
        topology::write_artifact(&artifact_path, &content)?;
        info!("Wrote cluster topology to {}", artifact_path.display());

        let my_cnf = self.config.my_cnf_path();
        if topology::write_artifact_if_absent(&my_cnf, &topology::render_my_cnf(coordinator))? {
            info!("Wrote {}", my_cnf.display());
        }

        ClusterManifest::new(*spec, network.clone(), nodes.to_vec())
            .save(&self.config.manifest_path())?;
        Ok(artifact_path)
    }

    async fn run_step(
        &self,
        stage: Stage,
        resource: &str,
        command: CommandSpec,
        started: &[String],
    ) -> Result<String, ClusterError> {
        debug!("[{}] {}", stage, command);
        self.executor.execute(&command).await.map_err(|source| {
            error!("{} stage failed on '{}': {}", stage, resource, source);
            ClusterError::StageFailed {
                stage,
                resource: resource.to_string(),
                started: started.to_vec(),
                source,
            }
        })
    }

    // ========================================================================
    // Delete path
    // ========================================================================

    /// Tear down the cluster `create(spec)` would have produced.
    ///
    /// Only an invalid shape is returned as an error; command failures are
    /// collected in the report.
    pub async fn delete(&mut self, spec: &ClusterSpec) -> Result<TeardownReport, ClusterError> {
        let (network, nodes) = allocate(spec, &self.config.plan)?;
        Ok(self.teardown(&network, &nodes).await)
    }

    /// Tear down exactly the nodes recorded in a manifest
    pub async fn delete_recorded(&mut self, manifest: &ClusterManifest) -> TeardownReport {
        self.teardown(&manifest.network, &manifest.nodes).await
    }

    async fn teardown(
        &mut self,
        network: &NetworkResource,
        nodes: &[NodeRecord],
    ) -> TeardownReport {
        info!(
            "Deleting {} containers and network {}",
            nodes.len(),
            network.name
        );
        let mut report = TeardownReport::default();

        // The state only advances while every earlier stage fully succeeded;
        // later stages are still attempted.
        let mut advancing = true;

        for (role, stopped) in [
            (NodeRole::Sql, LifecycleState::SqlNodesStopped),
            (NodeRole::Data, LifecycleState::DataNodesStopped),
            (NodeRole::Coordinator, LifecycleState::CoordinatorStopped),
        ] {
            let failures_before = report.failures.len();
            for node in nodes.iter().filter(|n| n.role == role) {
                let outcome = self.remove_container(&node.container_name, &mut report).await;
                report.containers.push((node.container_name.clone(), outcome));
            }
            advancing &= report.failures.len() == failures_before;
            if advancing {
                self.transition(stopped);
            }
        }

        let outcome = match self.executor.execute(&docker::network_rm(network)).await {
            Ok(_) => {
                info!("Removed network {}", network.name);
                TeardownOutcome::Removed
            }
            Err(e) if docker::is_missing_resource(e.stderr()) => {
                debug!("Network {} already absent", network.name);
                TeardownOutcome::AlreadyAbsent
            }
            Err(e) => {
                error!("Failed to remove network {}: {}", network.name, e);
                report.failures.push(TeardownFailure {
                    resource: network.name.clone(),
                    action: "network rm",
                    error: e,
                });
                TeardownOutcome::Failed
            }
        };
        report.network = Some((network.name.clone(), outcome));

        if report.is_clean() {
            self.transition(LifecycleState::NetworkRemoved);
            self.transition(LifecycleState::Absent);
            if let Err(e) = ClusterManifest::remove(&self.config.manifest_path()) {
                warn!("{}", e);
            }
        } else {
            warn!(
                "Teardown finished with {} failure(s); re-run delete after fixing them",
                report.failures.len()
            );
        }

        report
    }

    /// Stop then remove one container, tolerating a missing one.
    ///
    /// A failed stop is only logged: `rm -f` still removes a running
    /// container, and only its result decides the outcome.
    async fn remove_container(&self, name: &str, report: &mut TeardownReport) -> TeardownOutcome {
        let mut absent = false;

        match self.executor.execute(&docker::stop_container(name)).await {
            Ok(_) => debug!("Stopped {}", name),
            Err(e) if docker::is_missing_resource(e.stderr()) => {
                debug!("Container {} already stopped or absent", name);
                absent = true;
            }
            Err(e) => warn!("Failed to stop {}, forcing removal: {}", name, e),
        }

        match self.executor.execute(&docker::rm_container(name)).await {
            Ok(_) if absent => TeardownOutcome::AlreadyAbsent,
            Ok(_) => {
                info!("Removed container {}", name);
                TeardownOutcome::Removed
            }
            Err(e) if docker::is_missing_resource(e.stderr()) => TeardownOutcome::AlreadyAbsent,
            Err(e) => {
                warn!("Failed to remove {}: {}", name, e);
                report.failures.push(TeardownFailure {
                    resource: name.to_string(),
                    action: "rm",
                    error: e,
                });
                TeardownOutcome::Failed
            }
        }
    }
}
