//! Create/delete lifecycle against an in-memory docker daemon

mod common;

use common::{test_config, FakeDocker};
use ndbctl::cluster::{
    topology, ClusterError, ClusterManifest, ClusterOrchestrator, ClusterSpec, LifecycleState,
    NodeRole, Stage, TeardownOutcome,
};

fn spec(data: i64, sql: i64) -> ClusterSpec {
    ClusterSpec::new(data, sql).unwrap()
}

#[tokio::test]
async fn test_create_then_delete_leaves_nothing() {
    let docker = FakeDocker::new();
    let (config, _dir) = test_config();
    let mut orch = ClusterOrchestrator::new(docker.clone(), config);

    orch.create(&spec(2, 2)).await.unwrap();
    assert_eq!(
        docker.container_names(),
        vec!["management-1", "mysqld-1", "mysqld-2", "ndb-1", "ndb-2"]
    );
    assert_eq!(docker.networks(), vec!["mysql-cluster"]);
    assert!(docker.containers().values().all(|c| c.running));

    let report = orch.delete(&spec(2, 2)).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.count(TeardownOutcome::Removed), 5);
    assert!(docker.container_names().is_empty());
    assert!(docker.networks().is_empty());
    assert_eq!(orch.state(), LifecycleState::Absent);
}

#[tokio::test]
async fn test_nodes_join_the_coordinator() {
    let docker = FakeDocker::new();
    let (config, _dir) = test_config();
    let mut orch = ClusterOrchestrator::new(docker.clone(), config);
    orch.create(&spec(1, 1)).await.unwrap();

    let containers = docker.containers();
    let ndb = containers["ndb-1"].args.join(" ");
    assert!(ndb.contains("--ip 10.100.1.2"));
    assert!(ndb.contains("ndbd --ndb-nodeid=2 --connect-string 10.100.0.2"));

    let mysqld = containers["mysqld-1"].args.join(" ");
    assert!(mysqld.contains("-p 3307:3306"));
    assert!(mysqld.contains("--ndb-connectstring 10.100.0.2"));
}

#[tokio::test]
async fn test_failure_at_data_stage_keeps_earlier_stages() {
    let docker = FakeDocker::new();
    docker.fail_run_of("ndb-2");
    let (config, _dir) = test_config();
    let mut orch = ClusterOrchestrator::new(docker.clone(), config);

    let err = orch.create(&spec(2, 2)).await.unwrap_err();
    assert!(matches!(
        err,
        ClusterError::StageFailed {
            stage: Stage::DataNodes,
            ..
        }
    ));
    assert!(err.to_string().contains("data-node"));
    assert!(err.to_string().contains("ndb-2"));

    assert_eq!(docker.container_names(), vec!["management-1", "ndb-1"]);
    assert!(!docker.history().iter().any(|c| c.contains("mysqld")));
    assert_eq!(orch.state(), LifecycleState::CoordinatorRunning);

    // the partial cluster can still be torn down with the same shape
    let report = orch.delete(&spec(2, 2)).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.count(TeardownOutcome::Removed), 2);
    assert_eq!(report.count(TeardownOutcome::AlreadyAbsent), 3);
    assert!(docker.networks().is_empty());
}

#[tokio::test]
async fn test_delete_after_manual_removal() {
    let docker = FakeDocker::new();
    let (config, _dir) = test_config();
    let mut orch = ClusterOrchestrator::new(docker.clone(), config);
    orch.create(&spec(2, 1)).await.unwrap();

    docker.remove_manually("ndb-1");
    let report = orch.delete(&spec(2, 1)).await.unwrap();

    assert!(report.is_clean());
    assert!(report
        .containers
        .contains(&("ndb-1".to_string(), TeardownOutcome::AlreadyAbsent)));
    assert_eq!(
        report.network,
        Some(("mysql-cluster".to_string(), TeardownOutcome::Removed))
    );
    assert!(docker.container_names().is_empty());
    assert!(docker.networks().is_empty());
}

#[tokio::test]
async fn test_delete_of_absent_cluster_is_safe() {
    let docker = FakeDocker::new();
    let (config, _dir) = test_config();
    let mut orch = ClusterOrchestrator::new(docker.clone(), config);

    let report = orch.delete(&spec(2, 2)).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.count(TeardownOutcome::AlreadyAbsent), 5);
    assert_eq!(
        report.network,
        Some(("mysql-cluster".to_string(), TeardownOutcome::AlreadyAbsent))
    );
    assert_eq!(orch.state(), LifecycleState::Absent);
}

#[tokio::test]
async fn test_second_create_collides() {
    let docker = FakeDocker::new();
    let (config, _dir) = test_config();
    let mut first = ClusterOrchestrator::new(docker.clone(), config);
    first.create(&spec(1, 1)).await.unwrap();

    // a separate config dir has no manifest, so only docker can catch it
    let (other, _other_dir) = test_config();
    let mut second = ClusterOrchestrator::new(docker.clone(), other);
    let err = second.create(&spec(1, 1)).await.unwrap_err();
    match err {
        ClusterError::StageFailed { stage, source, .. } => {
            assert_eq!(stage, Stage::Network);
            assert!(source.stderr().contains("already exists"));
        }
        other => panic!("Expected StageFailed, got {:?}", other),
    }
    assert_eq!(docker.container_names().len(), 3);
}

#[tokio::test]
async fn test_refused_create_keeps_manifest_for_delete() {
    let docker = FakeDocker::new();
    let (config, _dir) = test_config();
    let manifest_path = config.manifest_path();

    let mut first = ClusterOrchestrator::new(docker.clone(), config.clone());
    first.create(&spec(2, 2)).await.unwrap();
    let commands = docker.history().len();

    let mut second = ClusterOrchestrator::new(docker.clone(), config);
    let err = second.create(&spec(1, 1)).await.unwrap_err();
    assert!(matches!(err, ClusterError::AlreadyProvisioned { .. }));
    assert_eq!(docker.history().len(), commands);

    let manifest = ClusterManifest::load(&manifest_path).unwrap();
    assert_eq!(manifest.nodes.len(), 5);

    let report = second.delete_recorded(&manifest).await;
    assert!(report.is_clean());
    assert!(docker.container_names().is_empty());
    assert!(docker.networks().is_empty());
}

#[tokio::test]
async fn test_artifact_describes_running_cluster() {
    let docker = FakeDocker::new();
    let (config, _dir) = test_config();
    let mut orch = ClusterOrchestrator::new(docker.clone(), config);
    let report = orch.create(&spec(3, 2)).await.unwrap();

    let content = std::fs::read_to_string(&report.artifact_path).unwrap();
    let entries = topology::parse(&content).unwrap();
    assert_eq!(entries.len(), report.nodes.len());
    for (entry, node) in entries.iter().zip(&report.nodes) {
        assert_eq!(entry.role, node.role);
        assert_eq!(entry.node_id, node.node_id);
        assert_eq!(entry.address, Some(node.address));
    }
    assert_eq!(
        entries.iter().filter(|e| e.role == NodeRole::Data).count(),
        3
    );
}

#[tokio::test]
async fn test_delete_from_manifest() {
    let docker = FakeDocker::new();
    let (config, _dir) = test_config();
    let manifest_path = config.manifest_path();
    let mut orch = ClusterOrchestrator::new(docker.clone(), config);
    orch.create(&spec(1, 3)).await.unwrap();

    let manifest = ClusterManifest::load(&manifest_path).unwrap();
    assert_eq!(manifest.nodes.len(), 5);

    let report = orch.delete_recorded(&manifest).await;
    assert!(report.is_clean());
    assert!(docker.container_names().is_empty());
    assert!(docker.networks().is_empty());
    assert!(!manifest_path.exists());
}
