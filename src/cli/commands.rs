//! Command implementations for the CLI
//!
//! SBIO pattern: Commands return Results, printing is handled by the caller

use thiserror::Error;
use tracing::info;

use super::{ClusterArgs, SeedArgs};
use crate::cluster::{
    allocate, topology, AllocationError, ClusterError, ClusterManifest, ClusterOrchestrator,
    ClusterSpec, CreateReport, ManifestError, NetworkResource, NodeRecord, TeardownReport,
};
use crate::config::{ConfigError, Settings};
use crate::runtime::{mysql, CommandExecutor, SeedError};

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid cluster shape: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Seed error: {0}")]
    Seed(#[from] SeedError),

    #[error("Teardown left {0} resource(s) behind")]
    IncompleteTeardown(usize),
}

/// Result type for commands
pub type CommandResult<T> = Result<T, CommandError>;

// ============================================================================
// Plan (pure)
// ============================================================================

/// Allocation and rendered artifact for a shape, without side effects
#[derive(Debug, Clone)]
pub struct ClusterPlan {
    pub spec: ClusterSpec,
    pub network: NetworkResource,
    pub nodes: Vec<NodeRecord>,
    pub artifact: String,
}

pub fn plan_cluster(settings: &Settings, args: &ClusterArgs) -> CommandResult<ClusterPlan> {
    let spec = args.spec()?;
    let (network, nodes) = allocate(&spec, &settings.address_plan()?)?;
    let artifact = topology::render(&network, &nodes, &settings.topology_params());
    Ok(ClusterPlan {
        spec,
        network,
        nodes,
        artifact,
    })
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Provision the cluster
pub async fn create_cluster<E: CommandExecutor>(
    settings: &Settings,
    executor: E,
    args: &ClusterArgs,
) -> CommandResult<CreateReport> {
    let spec = args.spec()?;
    let mut orchestrator = ClusterOrchestrator::new(executor, settings.orchestrator_config()?);
    Ok(orchestrator.create(&spec).await?)
}

/// Tear the cluster down, from the shape flags or from the manifest
pub async fn delete_cluster<E: CommandExecutor>(
    settings: &Settings,
    executor: E,
    args: &ClusterArgs,
    from_manifest: bool,
) -> CommandResult<TeardownReport> {
    let config = settings.orchestrator_config()?;
    let manifest_path = config.manifest_path();
    let mut orchestrator = ClusterOrchestrator::new(executor, config);

    if from_manifest {
        let manifest = ClusterManifest::load(&manifest_path)?;
        info!(
            "Deleting cluster recorded at {} (created {})",
            manifest_path.display(),
            manifest.created_at
        );
        Ok(orchestrator.delete_recorded(&manifest).await)
    } else {
        let spec = args.spec()?;
        Ok(orchestrator.delete(&spec).await?)
    }
}

// ============================================================================
// Seed
// ============================================================================

/// Host port a seed script should target
pub fn seed_port(settings: &Settings, args: &SeedArgs) -> u16 {
    args.port
        .unwrap_or_else(|| settings.nodes.sql_base_port.saturating_add(args.node))
}

/// Stream the script in `args.file` into the selected query node
pub async fn seed_database<E: CommandExecutor>(
    settings: &Settings,
    executor: &E,
    args: &SeedArgs,
) -> CommandResult<String> {
    let conn = settings.mysql_connection(seed_port(settings, args))?;
    Ok(mysql::run_script(executor, &conn, &args.file).await?)
}
