//! In-memory stand-in for the docker CLI
//!
//! Tracks networks and containers the way the daemon would and answers with
//! the daemon's error messages, so lifecycle tests can assert on the host
//! state left behind.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndbctl::cluster::{AddressPlan, OrchestratorConfig, TopologyParams};
use ndbctl::runtime::{CommandExecutor, CommandSpec, ExecutionError};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeContainer {
    pub network: String,
    pub running: bool,
    pub args: Vec<String>,
}

#[derive(Default)]
struct State {
    networks: BTreeSet<String>,
    containers: BTreeMap<String, FakeContainer>,
    failing_runs: HashSet<String>,
    history: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeDocker {
    state: Arc<Mutex<State>>,
}

fn fail(command: &CommandSpec, stderr: String) -> ExecutionError {
    ExecutionError::Failed {
        command: command.to_string(),
        code: Some(1),
        stderr,
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

impl FakeDocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `docker run` for this container exit non-zero
    pub fn fail_run_of(&self, container: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_runs
            .insert(container.to_string());
    }

    /// Simulate an operator removing a container by hand
    pub fn remove_manually(&self, container: &str) {
        self.state.lock().unwrap().containers.remove(container);
    }

    pub fn containers(&self) -> BTreeMap<String, FakeContainer> {
        self.state.lock().unwrap().containers.clone()
    }

    pub fn container_names(&self) -> Vec<String> {
        self.containers().keys().cloned().collect()
    }

    pub fn networks(&self) -> Vec<String> {
        self.state.lock().unwrap().networks.iter().cloned().collect()
    }

    pub fn history(&self) -> Vec<String> {
        self.state.lock().unwrap().history.clone()
    }
}

#[async_trait]
impl CommandExecutor for FakeDocker {
    async fn execute(&self, command: &CommandSpec) -> Result<String, ExecutionError> {
        assert_eq!(command.program, "docker");
        let mut state = self.state.lock().unwrap();
        state.history.push(command.to_string());

        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["network", "create", name, ..] => {
                if !state.networks.insert(name.to_string()) {
                    return Err(fail(
                        command,
                        format!("Error response from daemon: network with name {} already exists", name),
                    ));
                }
                Ok(format!("{}\n", name))
            }
            ["network", "rm", name] => {
                if !state.networks.contains(*name) {
                    return Err(fail(
                        command,
                        format!("Error response from daemon: network {} not found", name),
                    ));
                }
                if state.containers.values().any(|c| c.network == *name) {
                    return Err(fail(
                        command,
                        format!("Error response from daemon: error while removing network: network {} has active endpoints", name),
                    ));
                }
                state.networks.remove(*name);
                Ok(format!("{}\n", name))
            }
            ["run", ..] => {
                let name = flag_value(&command.args, "--name").expect("run without --name");
                let network = flag_value(&command.args, "--net").expect("run without --net");
                if !state.networks.contains(&network) {
                    return Err(fail(
                        command,
                        format!("docker: Error response from daemon: network {} not found.", network),
                    ));
                }
                if state.containers.contains_key(&name) {
                    return Err(fail(
                        command,
                        format!("docker: Error response from daemon: Conflict. The container name \"/{}\" is already in use.", name),
                    ));
                }
                if state.failing_runs.contains(&name) {
                    return Err(fail(command, format!("failed to start {}", name)));
                }
                state.containers.insert(
                    name.clone(),
                    FakeContainer {
                        network,
                        running: true,
                        args: command.args.clone(),
                    },
                );
                Ok(format!("{}-id\n", name))
            }
            ["stop", name] => match state.containers.get_mut(*name) {
                Some(container) => {
                    container.running = false;
                    Ok(format!("{}\n", name))
                }
                None => Err(fail(
                    command,
                    format!("Error response from daemon: No such container: {}", name),
                )),
            },
            ["rm", "-f", name] => match state.containers.remove(*name) {
                Some(_) => Ok(format!("{}\n", name)),
                None => Err(fail(
                    command,
                    format!("Error response from daemon: No such container: {}", name),
                )),
            },
            other => panic!("unexpected docker invocation: {:?}", other),
        }
    }
}

/// Orchestrator settings rooted in a fresh temp dir
pub fn test_config() -> (OrchestratorConfig, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = OrchestratorConfig {
        plan: AddressPlan::default(),
        topology: TopologyParams::default(),
        image: "mysql/mysql-cluster".to_string(),
        config_dir: dir.path().to_path_buf(),
    };
    (config, dir)
}
