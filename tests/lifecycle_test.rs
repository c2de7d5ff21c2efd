// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use k8slocal::domain::cluster::{ClusterStatus, ProviderKind, RecordStore, META_NODE_COUNT};
use k8slocal::infrastructure::provider::DriverContext;
use k8slocal::shared::LifecycleError;
use k8slocal::{CreateOptions, LifecycleManager, ProviderDrivers};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

mod test_utils {
    use k8slocal::infrastructure::kubernetes::ReadinessProbe;
    use k8slocal::infrastructure::process::{CommandOutput, CommandRunner};
    use k8slocal::shared::{KubeError, ProviderError};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Behaves like the `kind` CLI against an in-memory set of clusters.
    /// Every other provider tool is reported as missing.
    #[derive(Default)]
    pub struct FakeKind {
        clusters: Mutex<BTreeSet<String>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeKind {
        pub fn with_clusters(names: &[&str]) -> Self {
            let fake = Self::default();
            fake.clusters
                .lock()
                .unwrap()
                .extend(names.iter().map(|n| n.to_string()));
            fake
        }

        pub fn has(&self, name: &str) -> bool {
            self.clusters.lock().unwrap().contains(name)
        }

        pub fn count(&self, prefix: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.starts_with(prefix))
                .count()
        }
    }

    #[async_trait::async_trait]
    impl CommandRunner for FakeKind {
        async fn run(
            &self,
            program: &str,
            args: &[String],
            _timeout: Duration,
        ) -> Result<CommandOutput, ProviderError> {
            if program != "kind" {
                return Err(ProviderError::unavailable(program, "not found in PATH"));
            }
            self.calls
                .lock()
                .unwrap()
                .push(format!("kind {}", args.join(" ")));

            let argv: Vec<&str> = args.iter().map(String::as_str).collect();
            let mut clusters = self.clusters.lock().unwrap();
            let output = match argv.as_slice() {
                ["get", "clusters"] => {
                    let names: Vec<&str> = clusters.iter().map(String::as_str).collect();
                    CommandOutput::ok(names.join("\n"))
                }
                ["create", "cluster", "--name", name, ..] => {
                    if clusters.insert(name.to_string()) {
                        CommandOutput::ok("")
                    } else {
                        CommandOutput::failed(
                            1,
                            format!("node(s) already exist for a cluster with the name \"{}\"", name),
                        )
                    }
                }
                ["delete", "cluster", "--name", name] => {
                    clusters.remove(*name);
                    CommandOutput::ok("")
                }
                ["get", "kubeconfig", "--name", name] => CommandOutput::ok(format!(
                    "apiVersion: v1\nkind: Config\ncurrent-context: kind-{0}\n",
                    name
                )),
                ["get", "nodes", "--name", name] => {
                    CommandOutput::ok(format!("{}-control-plane\n", name))
                }
                _ => CommandOutput::failed(1, format!("unsupported: kind {}", args.join(" "))),
            };
            Ok(output)
        }
    }

    pub struct FakeProbe {
        pub healthy: AtomicBool,
    }

    impl FakeProbe {
        pub fn new(healthy: bool) -> Self {
            Self {
                healthy: AtomicBool::new(healthy),
            }
        }
    }

    #[async_trait::async_trait]
    impl ReadinessProbe for FakeProbe {
        async fn check(&self, _name: &str, kubeconfig: &[u8]) -> Result<(), KubeError> {
            if kubeconfig.is_empty() {
                return Err(KubeError::Kubeconfig("empty".to_string()));
            }
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(KubeError::NotReady("no nodes registered".to_string()))
            }
        }
    }
}

use test_utils::{FakeKind, FakeProbe};

fn manager_at(home: &TempDir, kind: Arc<FakeKind>, probe: Arc<FakeProbe>) -> LifecycleManager {
    let store = RecordStore::at_home(home.path());
    let drivers = ProviderDrivers::with_context(DriverContext::new(kind, store.root()));
    LifecycleManager::new(drivers, store, probe).unwrap()
}

fn setup(existing: &[&str], healthy: bool) -> (LifecycleManager, Arc<FakeKind>, Arc<FakeProbe>, TempDir) {
    let home = tempfile::tempdir().unwrap();
    let kind = Arc::new(FakeKind::with_clusters(existing));
    let probe = Arc::new(FakeProbe::new(healthy));
    let manager = manager_at(&home, kind.clone(), probe.clone());
    (manager, kind, probe, home)
}

#[tokio::test]
async fn test_create_list_kubeconfig_delete() {
    let (manager, kind, _, home) = setup(&[], true);
    let cancel = CancellationToken::new();

    let record = manager
        .create("test-1", ProviderKind::Kind, &CreateOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(record.status, ClusterStatus::Running);
    assert_eq!(record.provider, ProviderKind::Kind);
    assert_eq!(record.provider_metadata.get(META_NODE_COUNT).map(String::as_str), Some("1"));
    assert!(kind.has("test-1"));
    assert!(home.path().join("clusters/test-1/cluster.yaml").exists());

    let listed = manager.refresh().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "test-1");
    assert_eq!(listed[0].status, ClusterStatus::Running);

    let kubeconfig = manager.kubeconfig("test-1").await.unwrap();
    assert!(String::from_utf8(kubeconfig).unwrap().contains("kind-test-1"));

    manager.delete("test-1", &cancel).await.unwrap();
    assert!(!kind.has("test-1"));
    assert!(manager.list().is_empty());
    assert!(!home.path().join("clusters/test-1").exists());
}

#[tokio::test]
async fn test_duplicate_create_is_rejected() {
    let (manager, kind, _, _home) = setup(&[], true);
    let cancel = CancellationToken::new();

    manager
        .create("test-1", ProviderKind::Kind, &CreateOptions::default(), &cancel)
        .await
        .unwrap();
    let err = manager
        .create("test-1", ProviderKind::Kind, &CreateOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyExists(ref n) if n == "test-1"));
    assert_eq!(kind.count("kind create cluster"), 1);
}

#[tokio::test]
async fn test_invalid_name_never_reaches_provider() {
    let (manager, kind, _, _home) = setup(&[], true);
    let cancel = CancellationToken::new();

    for name in ["Bad_Name", "", "-leading", "trailing-"] {
        let err = manager
            .create(name, ProviderKind::Kind, &CreateOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidName(_)), "{name}");
    }
    assert!(kind.calls.lock().unwrap().is_empty());
    assert!(manager.list().is_empty());
}

#[tokio::test]
async fn test_refresh_discovers_external_clusters_and_skips_missing_tools() {
    let (manager, _, _, _home) = setup(&["made-by-hand"], true);

    let listed = manager.refresh().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "made-by-hand");
    assert_eq!(listed[0].provider, ProviderKind::Kind);
}

#[tokio::test]
async fn test_records_survive_restart() {
    let home = tempfile::tempdir().unwrap();
    let kind = Arc::new(FakeKind::default());
    let probe = Arc::new(FakeProbe::new(true));
    let cancel = CancellationToken::new();

    {
        let manager = manager_at(&home, kind.clone(), probe.clone());
        manager
            .create("test-1", ProviderKind::Kind, &CreateOptions::default(), &cancel)
            .await
            .unwrap();
    }

    let reopened = manager_at(&home, kind, probe);
    let records = reopened.list();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "test-1");
    assert_eq!(records[0].status, ClusterStatus::Running);
}

#[tokio::test]
async fn test_unreachable_cluster_is_marked_error() {
    let (manager, kind, _, _home) = setup(&[], false);
    let cancel = CancellationToken::new();

    let err = manager
        .create("test-1", ProviderKind::Kind, &CreateOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Verification { .. }));
    assert_eq!(manager.registry().get("test-1").unwrap().status, ClusterStatus::Error);
    // The provider resource is kept for inspection.
    assert!(kind.has("test-1"));

    manager.delete("test-1", &cancel).await.unwrap();
    assert!(!kind.has("test-1"));
    assert!(manager.list().is_empty());
}

#[tokio::test]
async fn test_delete_unknown_cluster() {
    let (manager, kind, _, _home) = setup(&[], true);
    let err = manager
        .delete("nope", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(_)));
    assert_eq!(kind.count("kind delete"), 0);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let (manager, kind, _, _home) = setup(&[], true);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = manager
        .create("test-1", ProviderKind::Kind, &CreateOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Cancelled { .. }));
    assert!(!kind.has("test-1"));
}

#[tokio::test]
async fn test_concurrent_creates_of_distinct_names() {
    let (manager, kind, _, _home) = setup(&[], true);
    let manager = Arc::new(manager);

    let handles: Vec<_> = ["alpha", "beta", "gamma"]
        .into_iter()
        .map(|name| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .create(name, ProviderKind::Kind, &CreateOptions::default(), &CancellationToken::new())
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(manager.list().len(), 3);
    for name in ["alpha", "beta", "gamma"] {
        assert!(kind.has(name));
    }
}

#[tokio::test]
async fn test_concurrent_creates_of_same_name_yield_one_cluster() {
    let (manager, kind, _, _home) = setup(&[], true);
    let manager = Arc::new(manager);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .create("test-1", ProviderKind::Kind, &CreateOptions::default(), &CancellationToken::new())
                    .await
            })
        })
        .collect();
    let mut ok = 0;
    let mut exists = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(LifecycleError::AlreadyExists(_)) => exists += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!((ok, exists), (1, 1));
    assert_eq!(kind.count("kind create cluster"), 1);
}
