//! CLI module for ndbctl
//!
//! Subcommands:
//! - `ndbctl create` - Provision network, management, data and sql nodes
//! - `ndbctl delete` - Stop and remove every node, then the network
//! - `ndbctl plan` - Show the allocation and rendered config without running anything
//! - `ndbctl seed` - Stream a SQL script into a query node

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;

pub use commands::*;
pub use display::*;

use crate::cluster::{AllocationError, ClusterSpec};

#[derive(Parser, Debug)]
#[command(name = "ndbctl")]
#[command(about = "Provision and tear down MySQL NDB clusters on a local docker network")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: ~/.ndbctl/config.yaml)
    #[arg(long, global = true, env = "NDBCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to a .env file loaded before the config
    #[arg(long, value_name = "FILE", global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the network and start every node in dependency order
    Create(ClusterArgs),

    /// Stop and remove every node, then the network
    Delete(DeleteArgs),

    /// Print the node allocation and config artifact without running docker
    Plan(PlanArgs),

    /// Stream a SQL script (schema or seed data) into a query node
    Seed(SeedArgs),
}

/// Cluster shape. `delete` must be given the same values as `create`.
#[derive(Args, Debug, Clone, Copy)]
pub struct ClusterArgs {
    /// Number of data nodes
    #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
    pub data: i64,

    /// Number of sql (query) nodes
    #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
    pub sql: i64,
}

impl ClusterArgs {
    pub fn spec(&self) -> Result<ClusterSpec, AllocationError> {
        ClusterSpec::new(self.data, self.sql)
    }
}

/// Arguments for the delete command
#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub shape: ClusterArgs,

    /// Tear down the nodes recorded in the manifest instead of re-deriving
    /// them from --data/--sql
    #[arg(long)]
    pub manifest: bool,
}

/// Arguments for the plan command
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub shape: ClusterArgs,

    /// Also print the rendered mysql-cluster.cnf
    #[arg(long)]
    pub show_config: bool,
}

/// Arguments for the seed command
#[derive(Args, Debug)]
pub struct SeedArgs {
    /// SQL script to stream into the client
    pub file: PathBuf,

    /// Query node ordinal to target (mysqld-<N>)
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u16).range(1..),
        conflicts_with = "port"
    )]
    pub node: u16,

    /// Host port to connect to, overriding --node
    #[arg(short, long)]
    pub port: Option<u16>,
}
