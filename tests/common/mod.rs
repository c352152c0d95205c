//! Shared helpers for integration tests.
#![allow(dead_code)]

use hackd::{supervisor, Config, Hub};
use tempfile::TempDir;

/// A started system plus the temp directory backing its snapshots.
pub struct TestSystem {
    pub hub: Hub,
    pub dir: TempDir,
}

/// Start a fresh single-host system in a new temp directory.
pub async fn start() -> TestSystem {
    let dir = tempfile::tempdir().expect("tempdir");
    start_in(dir).await
}

/// Start a system over an existing directory (bootstrap-from-snapshot).
pub async fn start_in(dir: TempDir) -> TestSystem {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().join("data");
    let hub = supervisor::start(&config).await.expect("system start");
    TestSystem { hub, dir }
}

/// Simulate a process restart: drop the old façade and boot a fresh
/// system over the same snapshot directory.
pub async fn restart(system: TestSystem) -> TestSystem {
    let TestSystem { hub, dir } = system;
    drop(hub);
    start_in(dir).await
}

/// Start a cluster node with a listen address and optional peers.
pub async fn start_node(name: &str, listen: Option<&str>, peers: &[&str]) -> TestSystem {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.node.name = name.to_string();
    config.storage.data_dir = dir.path().join("data");
    config.cluster.listen = listen.map(|s| s.to_string());
    config.cluster.peers = peers.iter().map(|s| s.to_string()).collect();
    let hub = supervisor::start(&config).await.expect("node start");
    TestSystem { hub, dir }
}
