//! # ndbctl
//!
//! Provisions a MySQL NDB cluster (one management node, N data nodes, M sql
//! nodes) as docker containers on a private network, generates the
//! `mysql-cluster.cnf` that binds them together, and tears it all down again.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod runtime;
