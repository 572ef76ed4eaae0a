//! Docker argument generation for cluster nodes
//!
//! Pure functions that turn allocated node records into `docker` argument
//! vectors. Nothing here spawns a process; the orchestrator hands the
//! resulting [`CommandSpec`]s to a [`CommandExecutor`](super::CommandExecutor).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::cluster::{NetworkResource, NodeRecord, NodeRole};

use super::executor::CommandSpec;

/// Port the `mysqld` process listens on inside its container
pub const MYSQLD_CONTAINER_PORT: u16 = 3306;

/// Where the cluster topology artifact is mounted inside every container
pub const CLUSTER_CNF_MOUNT: &str = "/etc/mysql-cluster.cnf";

/// Where `my.cnf` is mounted inside the management container
pub const MY_CNF_MOUNT: &str = "/etc/my.cnf";

/// Host-side inputs shared by every `docker run`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Image providing `ndb_mgmd`, `ndbd` and `mysqld`
    pub image: String,
    /// Absolute host path of the rendered cluster artifact
    pub cluster_cnf: PathBuf,
    /// Absolute host path of `my.cnf`
    pub my_cnf: PathBuf,
}

fn mount(host: &Path, container: &str) -> String {
    format!("{}:{}", host.display(), container)
}

// ============================================================================
// SBIO: Pure argument builders (no I/O)
// ============================================================================

/// Generate `docker network create` arguments
pub fn generate_network_create_args(network: &NetworkResource) -> Vec<String> {
    vec![
        "network".to_string(),
        "create".to_string(),
        network.name.clone(),
        "--subnet".to_string(),
        network.subnet(),
    ]
}

/// Generate `docker network rm` arguments
pub fn generate_network_rm_args(network: &NetworkResource) -> Vec<String> {
    vec![
        "network".to_string(),
        "rm".to_string(),
        network.name.clone(),
    ]
}

/// Generate `docker run` arguments for one node.
///
/// `coordinator` is the management node every other role joins through.
pub fn generate_run_args(
    node: &NodeRecord,
    network: &NetworkResource,
    coordinator: &NodeRecord,
    ctx: &RunContext,
) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--net".to_string(),
        network.name.clone(),
        "--name".to_string(),
        node.container_name.clone(),
        "--ip".to_string(),
        node.address.to_string(),
    ];

    let connect_string = coordinator.address.to_string();

    match node.role {
        NodeRole::Coordinator => {
            args.push("--hostname".to_string());
            args.push(node.container_name.clone());
            args.push("-v".to_string());
            args.push(mount(&ctx.my_cnf, MY_CNF_MOUNT));
            args.push("-v".to_string());
            args.push(mount(&ctx.cluster_cnf, CLUSTER_CNF_MOUNT));
            args.push(ctx.image.clone());
            args.push("ndb_mgmd".to_string());
            args.push(format!("--ndb-nodeid={}", node.node_id));
            args.push("--reload".to_string());
            args.push("--initial".to_string());
        }
        NodeRole::Data => {
            args.push("-v".to_string());
            args.push(mount(&ctx.cluster_cnf, CLUSTER_CNF_MOUNT));
            args.push(ctx.image.clone());
            args.push("ndbd".to_string());
            args.push(format!("--ndb-nodeid={}", node.node_id));
            args.push("--connect-string".to_string());
            args.push(connect_string);
        }
        NodeRole::Sql => {
            if let Some(port) = node.host_port {
                args.push("-p".to_string());
                args.push(format!("{}:{}", port, MYSQLD_CONTAINER_PORT));
            }
            args.push("-v".to_string());
            args.push(mount(&ctx.cluster_cnf, CLUSTER_CNF_MOUNT));
            args.push("-e".to_string());
            args.push("MYSQL_RANDOM_ROOT_PASSWORD=true".to_string());
            args.push(ctx.image.clone());
            args.push("mysqld".to_string());
            args.push(format!("--ndb-nodeid={}", node.node_id));
            args.push("--ndb-connectstring".to_string());
            args.push(connect_string);
        }
    }

    args
}

/// Generate Docker stop arguments
pub fn generate_stop_args(container_name: &str) -> Vec<String> {
    vec!["stop".to_string(), container_name.to_string()]
}

/// Generate Docker rm arguments
pub fn generate_rm_args(container_name: &str) -> Vec<String> {
    vec!["rm".to_string(), "-f".to_string(), container_name.to_string()]
}

pub fn network_create(network: &NetworkResource) -> CommandSpec {
    CommandSpec::docker(generate_network_create_args(network))
}

pub fn network_rm(network: &NetworkResource) -> CommandSpec {
    CommandSpec::docker(generate_network_rm_args(network))
}

pub fn run_node(
    node: &NodeRecord,
    network: &NetworkResource,
    coordinator: &NodeRecord,
    ctx: &RunContext,
) -> CommandSpec {
    CommandSpec::docker(generate_run_args(node, network, coordinator, ctx))
}

pub fn stop_container(container_name: &str) -> CommandSpec {
    CommandSpec::docker(generate_stop_args(container_name))
}

pub fn rm_container(container_name: &str) -> CommandSpec {
    CommandSpec::docker(generate_rm_args(container_name))
}

/// Whether a docker error message means the target is already gone
/// (or already stopped), which teardown treats as success.
pub fn is_missing_resource(stderr: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)(no such (container|network|object)|network \S+ not found|is not running)",
            )
            .ok()
        })
        .as_ref()
        .is_some_and(|re| re.is_match(stderr))
}
