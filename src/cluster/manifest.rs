//! Record of what `create` provisioned
//!
//! Written before the first container command so that teardown can target
//! exactly the recorded nodes instead of re-deriving names from the CLI
//! flags.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::allocator::ClusterSpec;
use super::node::{NetworkResource, NodeRecord};
use super::topology::{write_artifact, PersistenceError};

/// File name of the manifest inside the cluster config directory
pub const MANIFEST_FILE: &str = "cluster-manifest.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterManifest {
    pub spec: ClusterSpec,
    pub network: NetworkResource,
    pub nodes: Vec<NodeRecord>,
    pub created_at: DateTime<Utc>,
}

impl ClusterManifest {
    pub fn new(spec: ClusterSpec, network: NetworkResource, nodes: Vec<NodeRecord>) -> Self {
        Self {
            spec,
            network,
            nodes,
            created_at: Utc::now(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| PersistenceError {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
        write_artifact(path, &content)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Delete the manifest; a missing file is not an error
    pub fn remove(path: &Path) -> Result<(), PersistenceError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
