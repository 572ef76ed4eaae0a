//! Settings file (`~/.ndbctl/config.yaml`)
//!
//! Every field is optional; the defaults reproduce the stock cluster layout
//! (`mysql-cluster` network on `10.100.0.0/16`, `mysql/mysql-cluster` image,
//! artifacts under `./DOCKER_CLUSTER`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cluster::{
    AddressPlan, AllocationError, OrchestratorConfig, TopologyParams, DEFAULT_NETWORK_NAME,
    DEFAULT_SQL_BASE_PORT, DEFAULT_SUBNET_PREFIX,
};
use crate::runtime::MysqlConnection;

/// Default settings file location: ~/.ndbctl/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ndbctl")
        .join("config.yaml")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid network settings: {0}")]
    Network(#[from] AllocationError),

    #[error("Failed to expand '{value}': {reason}")]
    Expand { value: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub network: NetworkSettings,

    #[serde(default)]
    pub nodes: NodeSettings,

    /// Directory holding `mysql/mysql-cluster.cnf`, `mysql/my.cnf` and the
    /// manifest. `~` and `${VAR}` are expanded; relative paths resolve
    /// against the working directory.
    #[serde(default = "default_config_dir")]
    pub config_dir: String,

    #[serde(default)]
    pub mysql: MysqlSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(default = "default_network_name")]
    pub name: String,
    /// First two octets of the /16 subnet
    #[serde(default = "default_subnet_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default = "default_data_memory")]
    pub data_memory: String,
    #[serde(default = "default_index_memory")]
    pub index_memory: String,
    #[serde(default = "default_datadir")]
    pub datadir: String,
    /// Query node `j` is published on `sql_base_port + j`
    #[serde(default = "default_sql_base_port")]
    pub sql_base_port: u16,
}

/// Credentials used by `ndbctl seed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MysqlSettings {
    #[serde(default = "default_mysql_user")]
    pub user: String,
    #[serde(default = "default_mysql_host")]
    pub host: String,
    /// Supports env var expansion: "${MYSQL_PASSWORD}"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_config_dir() -> String {
    "./DOCKER_CLUSTER".to_string()
}

fn default_network_name() -> String {
    DEFAULT_NETWORK_NAME.to_string()
}

fn default_subnet_prefix() -> String {
    DEFAULT_SUBNET_PREFIX.to_string()
}

fn default_image() -> String {
    "mysql/mysql-cluster".to_string()
}

fn default_replicas() -> u32 {
    2
}

fn default_data_memory() -> String {
    "80M".to_string()
}

fn default_index_memory() -> String {
    "18M".to_string()
}

fn default_datadir() -> String {
    "/var/lib/mysql".to_string()
}

fn default_sql_base_port() -> u16 {
    DEFAULT_SQL_BASE_PORT
}

fn default_mysql_user() -> String {
    "root".to_string()
}

fn default_mysql_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network: NetworkSettings::default(),
            nodes: NodeSettings::default(),
            config_dir: default_config_dir(),
            mysql: MysqlSettings::default(),
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            name: default_network_name(),
            prefix: default_subnet_prefix(),
        }
    }
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            image: default_image(),
            replicas: default_replicas(),
            data_memory: default_data_memory(),
            index_memory: default_index_memory(),
            datadir: default_datadir(),
            sql_base_port: default_sql_base_port(),
        }
    }
}

impl Default for MysqlSettings {
    fn default() -> Self {
        Self {
            user: default_mysql_user(),
            host: default_mysql_host(),
            password: None,
        }
    }
}

fn expand(value: &str) -> Result<String, ConfigError> {
    shellexpand::full(value)
        .map(|v| v.into_owned())
        .map_err(|e| ConfigError::Expand {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

impl Settings {
    pub fn address_plan(&self) -> Result<AddressPlan, ConfigError> {
        Ok(AddressPlan::new(
            self.network.name.clone(),
            &self.network.prefix,
            self.nodes.sql_base_port,
        )?)
    }

    pub fn topology_params(&self) -> TopologyParams {
        TopologyParams {
            replicas: self.nodes.replicas,
            data_memory: self.nodes.data_memory.clone(),
            index_memory: self.nodes.index_memory.clone(),
            datadir: self.nodes.datadir.clone(),
        }
    }

    /// Expanded, absolute config directory. Docker bind mounts need an
    /// absolute host path.
    pub fn resolved_config_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = PathBuf::from(expand(&self.config_dir)?);
        if dir.is_absolute() {
            Ok(dir)
        } else {
            Ok(std::env::current_dir()?.join(dir))
        }
    }

    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig, ConfigError> {
        Ok(OrchestratorConfig {
            plan: self.address_plan()?,
            topology: self.topology_params(),
            image: self.nodes.image.clone(),
            config_dir: self.resolved_config_dir()?,
        })
    }

    /// Connection to the query node published on `port`
    pub fn mysql_connection(&self, port: u16) -> Result<MysqlConnection, ConfigError> {
        let password = match &self.mysql.password {
            Some(raw) => Some(expand(raw)?),
            None => None,
        };
        Ok(MysqlConnection {
            user: self.mysql.user.clone(),
            host: self.mysql.host.clone(),
            port,
            password,
        })
    }
}

// ============================================================================
// SBIO: Pure parsing, thin I/O wrapper
// ============================================================================

/// Parse settings from YAML
pub fn parse_settings(content: &str) -> Result<Settings, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load settings.
///
/// An explicit `path` must exist. Without one, the default location is used
/// when present and built-in defaults otherwise.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = match path {
        Some(p) => {
            let expanded = PathBuf::from(expand(&p.to_string_lossy())?);
            if !expanded.exists() {
                return Err(ConfigError::ConfigNotFound(expanded));
            }
            expanded
        }
        None => {
            let default = default_config_path();
            if !default.exists() {
                debug!("No config at {}, using defaults", default.display());
                return Ok(Settings::default());
            }
            default
        }
    };

    debug!("Loading settings from {}", path.display());
    let content = std::fs::read_to_string(&path)?;
    parse_settings(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_stock_layout() {
        let settings = Settings::default();
        let plan = settings.address_plan().unwrap();
        assert_eq!(plan, AddressPlan::default());
        assert_eq!(settings.topology_params(), TopologyParams::default());
        assert_eq!(settings.nodes.image, "mysql/mysql-cluster");
    }

    #[test]
    fn test_parse_partial_settings() {
        let yaml = r#"
network:
  name: ndb-dev
nodes:
  replicas: 1
  sql_base_port: 4000
"#;
        let settings = parse_settings(yaml).unwrap();
        assert_eq!(settings.network.name, "ndb-dev");
        assert_eq!(settings.network.prefix, "10.100");
        assert_eq!(settings.nodes.replicas, 1);
        assert_eq!(settings.nodes.sql_base_port, 4000);
        assert_eq!(settings.nodes.data_memory, "80M");
        assert_eq!(settings.config_dir, "./DOCKER_CLUSTER");
    }

    #[test]
    fn test_parse_empty_is_default() {
        assert_eq!(parse_settings("").unwrap(), Settings::default());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        assert!(matches!(
            parse_settings("network: [unclosed"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_invalid_prefix_is_rejected() {
        let mut settings = Settings::default();
        settings.network.prefix = "10.100.5".to_string();
        assert!(matches!(
            settings.orchestrator_config(),
            Err(ConfigError::Network(_))
        ));
    }

    #[test]
    fn test_resolved_config_dir_is_absolute() {
        let settings = Settings::default();
        let dir = settings.resolved_config_dir().unwrap();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("DOCKER_CLUSTER"));
    }

    #[test]
    fn test_mysql_password_expansion() {
        std::env::set_var("NDBCTL_TEST_PASSWORD", "s3cret");
        let mut settings = Settings::default();
        settings.mysql.password = Some("${NDBCTL_TEST_PASSWORD}".to_string());
        let conn = settings.mysql_connection(3307).unwrap();
        assert_eq!(conn.password.as_deref(), Some("s3cret"));
        assert_eq!(conn.port, 3307);
        std::env::remove_var("NDBCTL_TEST_PASSWORD");
    }

    #[test]
    fn test_mysql_password_missing_env() {
        let mut settings = Settings::default();
        settings.mysql.password = Some("${NDBCTL_TEST_UNSET_VARIABLE}".to_string());
        assert!(matches!(
            settings.mysql_connection(3307),
            Err(ConfigError::Expand { .. })
        ));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"config_dir: /tmp/ndb\n").unwrap();
        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.config_dir, "/tmp/ndb");
        assert_eq!(
            settings.resolved_config_dir().unwrap(),
            PathBuf::from("/tmp/ndb")
        );
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = load_settings(Some(Path::new("/nonexistent/ndbctl.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigNotFound(_)));
    }
}
