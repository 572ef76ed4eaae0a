//! Cluster topology artifact (`mysql-cluster.cnf`)
//!
//! Rendering is pure and deterministic: sections follow allocation order, so
//! the same node set always yields byte-identical output. Writing the
//! artifact is the only I/O here.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::node::{NetworkResource, NodeRecord, NodeRole};

/// Group holding defaults shared by every data node
pub const DATA_DEFAULTS_SECTION: &str = "ndbd default";

#[derive(Error, Debug)]
#[error("failed to write {}: {source}", .path.display())]
pub struct PersistenceError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyParseError {
    #[error("line {line}: key outside of any section")]
    KeyOutsideSection { line: usize },

    #[error("line {line}: expected key=value, got '{content}'")]
    Malformed { line: usize, content: String },

    #[error("line {line}: invalid {key} value '{value}'")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
    },

    #[error("[{section}] section ending at line {line} has no NodeId")]
    MissingNodeId { section: String, line: usize },
}

/// Cluster-wide parameters written into the artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyParams {
    pub replicas: u32,
    pub data_memory: String,
    pub index_memory: String,
    pub datadir: String,
}

impl Default for TopologyParams {
    fn default() -> Self {
        Self {
            replicas: 2,
            data_memory: "80M".to_string(),
            index_memory: "18M".to_string(),
            datadir: "/var/lib/mysql".to_string(),
        }
    }
}

/// One node section recovered from an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyEntry {
    pub role: NodeRole,
    pub node_id: u32,
    pub address: Option<Ipv4Addr>,
}

impl From<&NodeRecord> for TopologyEntry {
    fn from(node: &NodeRecord) -> Self {
        Self {
            role: node.role,
            node_id: node.node_id,
            address: Some(node.address),
        }
    }
}

// ============================================================================
// SBIO: Pure rendering and parsing (no I/O)
// ============================================================================

/// Render the topology artifact for `nodes`
pub fn render(
    network: &NetworkResource,
    nodes: &[NodeRecord],
    params: &TopologyParams,
) -> String {
    let mut lines = vec![
        format!("# network {} {}", network.name, network.subnet()),
        format!("[{}]", DATA_DEFAULTS_SECTION),
        format!("NoOfReplicas={}", params.replicas),
        format!("DataMemory={}", params.data_memory),
        format!("IndexMemory={}", params.index_memory),
    ];

    for node in nodes {
        lines.push(format!("[{}]", node.role.section()));
        lines.push(format!("NodeId={}", node.node_id));
        lines.push(format!("hostname={}", node.address));
        if node.role != NodeRole::Sql {
            lines.push(format!("datadir={}", params.datadir));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Render the `my.cnf` mounted into the management container
pub fn render_my_cnf(coordinator: &NodeRecord) -> String {
    format!(
        "[mysqld]\nndbcluster\nndb-connectstring={addr}\n\n[mysql_cluster]\nndb-connectstring={addr}\n",
        addr = coordinator.address
    )
}

/// Parse node sections back out of an artifact.
///
/// Keys are matched case-insensitively, comments (`#`, `;`) and the
/// `[ndbd default]` group are skipped.
pub fn parse(content: &str) -> Result<Vec<TopologyEntry>, TopologyParseError> {
    struct Open {
        section: String,
        role: Option<NodeRole>,
        node_id: Option<u32>,
        address: Option<Ipv4Addr>,
    }

    fn close(
        open: Option<Open>,
        line: usize,
        out: &mut Vec<TopologyEntry>,
    ) -> Result<(), TopologyParseError> {
        if let Some(Open {
            section,
            role: Some(role),
            node_id,
            address,
        }) = open
        {
            let node_id = node_id.ok_or(TopologyParseError::MissingNodeId { section, line })?;
            out.push(TopologyEntry {
                role,
                node_id,
                address,
            });
        }
        Ok(())
    }

    let mut entries = Vec::new();
    let mut current: Option<Open> = None;
    let mut last_line = 0;

    for (idx, raw) in content.lines().enumerate() {
        let line = idx + 1;
        last_line = line;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') || text.starts_with(';') {
            continue;
        }

        if let Some(section) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            close(current.take(), line - 1, &mut entries)?;
            let section = section.trim().to_lowercase();
            current = Some(Open {
                role: NodeRole::from_section(&section),
                section,
                node_id: None,
                address: None,
            });
            continue;
        }

        let (key, value) = text.split_once('=').ok_or_else(|| TopologyParseError::Malformed {
            line,
            content: text.to_string(),
        })?;
        let key = key.trim().to_lowercase();
        let value = value.trim();
        let open = current
            .as_mut()
            .ok_or(TopologyParseError::KeyOutsideSection { line })?;

        let invalid = || TopologyParseError::InvalidValue {
            line,
            key: key.clone(),
            value: value.to_string(),
        };
        match key.as_str() {
            "nodeid" | "id" => open.node_id = Some(value.parse().map_err(|_| invalid())?),
            "hostname" => open.address = Some(value.parse().map_err(|_| invalid())?),
            _ => {}
        }
    }

    close(current, last_line, &mut entries)?;
    Ok(entries)
}

// ============================================================================
// I/O boundary
// ============================================================================

/// Write `content` to `path`, creating parent directories.
///
/// The file is flushed and synced before returning; the handle is closed on
/// every path when it drops.
pub fn write_artifact(path: &Path, content: &str) -> Result<(), PersistenceError> {
    let wrap = |source: std::io::Error| PersistenceError {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(wrap)?;
    }

    let file = File::create(path).map_err(wrap)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(content.as_bytes()).map_err(wrap)?;
    writer.flush().map_err(wrap)?;
    writer.get_ref().sync_all().map_err(wrap)?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Write `content` unless a file already exists at `path`.
/// Returns whether the file was written.
pub fn write_artifact_if_absent(path: &Path, content: &str) -> Result<bool, PersistenceError> {
    if path.exists() {
        return Ok(false);
    }
    write_artifact(path, content)?;
    Ok(true)
}
