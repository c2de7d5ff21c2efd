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

use super::record::{ClusterRecord, ClusterStatus, ProviderKind};
use super::validator::is_valid_cluster_name;
use crate::infrastructure::provider::ProviderDrivers;
use crate::shared::error::ProviderError;
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// What a [`ClusterRegistry::refresh`] changed.
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Every record after the refresh, ordered by name.
    pub records: Vec<ClusterRecord>,
    /// Records that were added or modified and need persisting.
    pub changed: Vec<ClusterRecord>,
    /// Names whose clusters are gone.
    pub removed: Vec<String>,
    /// Providers whose tooling could not be queried.
    pub unreachable: Vec<ProviderKind>,
}

/// In-memory view of every cluster k8slocal knows about.
#[derive(Debug, Default)]
pub struct ClusterRegistry {
    records: Mutex<BTreeMap<String, ClusterRecord>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = ClusterRecord>) -> Self {
        let registry = Self::new();
        for record in records {
            registry.upsert(record);
        }
        registry
    }

    fn map(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, ClusterRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, name: &str) -> Option<ClusterRecord> {
        self.map().get(name).cloned()
    }

    pub fn list(&self) -> Vec<ClusterRecord> {
        self.map().values().cloned().collect()
    }

    pub fn upsert(&self, record: ClusterRecord) {
        self.map().insert(record.name.clone(), record);
    }

    pub fn remove(&self, name: &str) -> Option<ClusterRecord> {
        self.map().remove(name)
    }

    /// Apply `f` to the record of `name` and return the result.
    pub fn update<F>(&self, name: &str, f: F) -> Option<ClusterRecord>
    where
        F: FnOnce(&mut ClusterRecord),
    {
        let mut map = self.map();
        let record = map.get_mut(name)?;
        f(record);
        Some(record.clone())
    }

    /// Reconcile the map with what the providers report.
    ///
    /// `is_busy` is asked under the map lock, after every listing has
    /// returned; names it reports as busy are left untouched.
    pub async fn refresh<F>(&self, drivers: &ProviderDrivers, is_busy: F) -> RefreshReport
    where
        F: Fn(&str) -> bool,
    {
        let listings = join_all(drivers.iter().map(|driver| async move {
            (driver.kind(), driver.list_clusters().await)
        }))
        .await;

        let mut report = RefreshReport::default();
        let mut answered: HashSet<ProviderKind> = HashSet::new();
        let mut live: BTreeMap<String, (ProviderKind, String)> = BTreeMap::new();

        for (kind, listing) in listings {
            let clusters = match listing {
                Ok(clusters) => clusters,
                Err(ProviderError::Unavailable { tool, reason }) => {
                    warn!(provider = %kind, %tool, %reason, "provider unavailable, skipping");
                    report.unreachable.push(kind);
                    continue;
                }
                Err(e) => {
                    warn!(provider = %kind, error = %e, "failed to list clusters, skipping");
                    report.unreachable.push(kind);
                    continue;
                }
            };
            answered.insert(kind);

            for (name, raw_status) in clusters {
                if !is_valid_cluster_name(&name) {
                    warn!(provider = %kind, cluster = %name, "ignoring cluster with invalid name");
                    continue;
                }
                if let Some((owner, _)) = live.get(&name) {
                    warn!(
                        cluster = %name,
                        kept = %owner,
                        ignored = %kind,
                        "cluster name reported by more than one provider"
                    );
                    continue;
                }
                live.insert(name, (kind, raw_status));
            }
        }

        let mut map = self.map();

        for (name, (kind, raw_status)) in &live {
            if is_busy(name) {
                debug!(cluster = %name, "operation in flight, not refreshing");
                continue;
            }
            let status = ClusterStatus::from_raw(raw_status);
            let next = match map.get(name) {
                Some(existing) => {
                    let mut next = existing.clone();
                    next.provider = *kind;
                    next.status = status;
                    next
                }
                None => {
                    info!(cluster = %name, provider = %kind, "discovered cluster");
                    ClusterRecord::with_status(name.clone(), *kind, status)
                }
            };
            if map.get(name) != Some(&next) {
                report.changed.push(next.clone());
                map.insert(name.clone(), next);
            }
        }

        let stale: Vec<String> = map
            .keys()
            .filter(|name| !live.contains_key(*name) && !is_busy(name))
            .cloned()
            .collect();
        for name in stale {
            let Some(record) = map.get_mut(&name) else {
                continue;
            };
            if answered.contains(&record.provider) {
                info!(cluster = %name, provider = %record.provider, "cluster no longer exists");
                map.remove(&name);
                report.removed.push(name);
            } else if record.status != ClusterStatus::Unknown {
                record.status = ClusterStatus::Unknown;
                report.changed.push(record.clone());
            }
        }

        report.records = map.values().cloned().collect();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cluster::record::ClusterDetails;
    use crate::infrastructure::provider::{CreateOptions, ListedCluster, ProviderDriver};
    use std::sync::Arc;

    struct ListingDriver {
        kind: ProviderKind,
        listing: Result<Vec<ListedCluster>, ProviderError>,
    }

    impl ListingDriver {
        fn new(kind: ProviderKind, names: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                kind,
                listing: Ok(names
                    .iter()
                    .map(|(n, s)| (n.to_string(), s.to_string()))
                    .collect()),
            })
        }

        fn unavailable(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                listing: Err(ProviderError::unavailable(kind.as_str(), "not found in PATH")),
            })
        }
    }

    #[async_trait::async_trait]
    impl ProviderDriver for ListingDriver {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn list_clusters(&self) -> Result<Vec<ListedCluster>, ProviderError> {
            self.listing.clone()
        }

        async fn create_cluster(&self, _: &str, _: &CreateOptions) -> Result<(), ProviderError> {
            unreachable!()
        }

        async fn delete_cluster(&self, _: &str) -> Result<(), ProviderError> {
            unreachable!()
        }

        async fn get_kubeconfig(&self, _: &str) -> Result<Vec<u8>, ProviderError> {
            unreachable!()
        }

        async fn get_details(&self, _: &str) -> Result<ClusterDetails, ProviderError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_refresh_merges_live_and_stored() {
        let mut stored = ClusterRecord::with_status("dev", ProviderKind::Kind, ClusterStatus::Error);
        stored.created_at = "2024-01-01T00:00:00Z".parse().unwrap();
        let registry = ClusterRegistry::with_records([
            stored.clone(),
            ClusterRecord::with_status("gone", ProviderKind::Kind, ClusterStatus::Running),
            ClusterRecord::with_status("edge", ProviderKind::Talos, ClusterStatus::Running),
        ]);
        let drivers = ProviderDrivers::new()
            .register(ListingDriver::unavailable(ProviderKind::Talos))
            .register(ListingDriver::new(
                ProviderKind::Kind,
                &[("dev", "running"), ("new", "running")],
            ));

        let report = registry.refresh(&drivers, |_| false).await;

        let dev = registry.get("dev").unwrap();
        assert_eq!(dev.status, ClusterStatus::Running);
        assert_eq!(dev.created_at, stored.created_at);
        assert!(registry.get("new").is_some());
        assert!(registry.get("gone").is_none());
        assert_eq!(registry.get("edge").unwrap().status, ClusterStatus::Unknown);

        assert_eq!(report.removed, vec!["gone".to_string()]);
        assert_eq!(report.unreachable, vec![ProviderKind::Talos]);
        assert_eq!(report.records.len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_names_first_driver_wins() {
        let registry = ClusterRegistry::new();
        let drivers = ProviderDrivers::new()
            .register(ListingDriver::new(ProviderKind::Kind, &[("dev", "running")]))
            .register(ListingDriver::new(ProviderKind::K3s, &[("dev", "stopped")]));

        let report = registry.refresh(&drivers, |_| false).await;
        assert_eq!(report.records.len(), 1);
        assert_eq!(registry.get("dev").unwrap().provider, ProviderKind::Kind);
    }

    #[tokio::test]
    async fn test_skip_set_is_untouched() {
        let creating = ClusterRecord::new("busy", ProviderKind::Kind);
        let registry = ClusterRegistry::with_records([creating.clone()]);
        let drivers = ProviderDrivers::new().register(ListingDriver::new(ProviderKind::Kind, &[]));

        let skip = HashSet::from(["busy".to_string()]);
        let report = registry.refresh(&drivers, |name| skip.contains(name)).await;

        assert_eq!(registry.get("busy"), Some(creating));
        assert!(report.removed.is_empty());
        assert!(report.changed.is_empty());
    }

    #[tokio::test]
    async fn test_unsafe_names_from_providers_are_ignored() {
        let registry = ClusterRegistry::new();
        let drivers = ProviderDrivers::new().register(ListingDriver::new(
            ProviderKind::Kind,
            &[
                ("Bad_Name", "running"),
                ("../escaped", "running"),
                ("", "running"),
                ("ok", "running"),
            ],
        ));

        let report = registry.refresh(&drivers, |_| false).await;
        let names: Vec<&str> = report.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["ok"]);
        assert_eq!(report.changed.len(), 1);
        assert!(registry.get("../escaped").is_none());
    }

    #[tokio::test]
    async fn test_all_drivers_unavailable_keeps_records() {
        let registry = ClusterRegistry::with_records([ClusterRecord::with_status(
            "dev",
            ProviderKind::Kind,
            ClusterStatus::Running,
        )]);
        let drivers = ProviderDrivers::new().register(ListingDriver::unavailable(ProviderKind::Kind));

        let report = registry.refresh(&drivers, |_| false).await;
        assert_eq!(registry.get("dev").unwrap().status, ClusterStatus::Unknown);
        assert_eq!(report.changed.len(), 1);
    }
}
