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

//! Cluster lifecycle orchestration
//!
//! Per cluster name the states are
//! `absent -> creating -> running -> deleting -> absent`, with `error` reachable
//! from `creating`/`deleting` when the provider fails and from `creating` when
//! the new cluster does not answer on its API. Every transition is written to
//! the [`RecordStore`] before the next provider call.

use super::locks::NameLocks;
use super::record::{
    ClusterDetails, ClusterRecord, ClusterStatus, ProviderKind, META_KUBERNETES_VERSION,
    META_LAST_ERROR, META_NODE_COUNT,
};
use super::registry::ClusterRegistry;
use super::store::RecordStore;
use super::validator::validate_cluster_name;
use crate::infrastructure::constants::{
    MAX_TRANSIENT_RETRIES, RETRY_MAX_DELAY, RETRY_MIN_DELAY,
};
use crate::infrastructure::fs::write_atomic;
use crate::infrastructure::helm::{HelmClient, HelmRelease};
use crate::infrastructure::kubernetes::{
    ClusterKubeClient, NodeSummary, ReadinessProbe, WorkloadSummary,
};
use crate::infrastructure::provider::{CreateOptions, ProviderDriver, ProviderDrivers};
use crate::shared::error::{LifecycleError, Operation, ProviderError, Result, StateError};
use backon::{ExponentialBuilder, Retryable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const HELM_KUBECONFIG_FILE_NAME: &str = "helm.kubeconfig";

/// Bounded retry of transient provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_TRANSIENT_RETRIES,
            min_delay: RETRY_MIN_DELAY,
            max_delay: RETRY_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }
}

/// API-level view of a cluster.
#[derive(Debug, Clone)]
pub struct K8sDetails {
    pub name: String,
    pub provider: ProviderKind,
    pub server_version: String,
    pub nodes: Vec<NodeSummary>,
}

pub struct LifecycleManager {
    drivers: ProviderDrivers,
    registry: ClusterRegistry,
    store: RecordStore,
    locks: NameLocks,
    probe: Arc<dyn ReadinessProbe>,
    helm: HelmClient,
    retry: RetryPolicy,
}

impl LifecycleManager {
    /// Build a manager whose registry starts from the records on disk.
    pub fn new(
        drivers: ProviderDrivers,
        store: RecordStore,
        probe: Arc<dyn ReadinessProbe>,
    ) -> Result<Self> {
        let records = store.load_all()?;
        debug!(count = records.len(), root = %store.root().display(), "loaded cluster records");
        Ok(Self {
            drivers,
            registry: ClusterRegistry::with_records(records),
            store,
            locks: NameLocks::new(),
            probe,
            helm: HelmClient::default(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_helm(mut self, helm: HelmClient) -> Self {
        self.helm = helm;
        self
    }

    pub fn registry(&self) -> &ClusterRegistry {
        &self.registry
    }

    pub fn drivers(&self) -> &ProviderDrivers {
        &self.drivers
    }

    /// Records as currently known, without asking the providers.
    pub fn list(&self) -> Vec<ClusterRecord> {
        self.registry.list()
    }

    /// Reconcile with the providers and persist what changed.
    pub async fn refresh(&self) -> Result<Vec<ClusterRecord>> {
        let report = self
            .registry
            .refresh(&self.drivers, |name| self.locks.is_busy(name))
            .await;

        // An operation may have claimed a name since the registry was updated;
        // its own writes win.
        for changed in &report.changed {
            let Some(_guard) = self.locks.try_acquire(&changed.name) else {
                continue;
            };
            if let Some(record) = self.registry.get(&changed.name) {
                self.store.save(&record)?;
            }
        }
        for name in &report.removed {
            let Some(_guard) = self.locks.try_acquire(name) else {
                continue;
            };
            if self.registry.get(name).is_none() {
                self.store.purge(name)?;
            }
        }
        Ok(report.records)
    }

    pub async fn create(
        &self,
        name: &str,
        provider: ProviderKind,
        options: &CreateOptions,
        cancel: &CancellationToken,
    ) -> Result<ClusterRecord> {
        validate_cluster_name(name).map_err(|_| LifecycleError::InvalidName(name.to_string()))?;
        let driver = self.driver(provider)?;
        let _guard = self.acquire(name, Operation::Create, cancel).await?;

        let previous = self.registry.get(name);
        if let Some(existing) = &previous {
            match existing.status {
                ClusterStatus::Creating | ClusterStatus::Deleting => {
                    return Err(LifecycleError::AlreadyInProgress {
                        name: name.to_string(),
                        status: existing.status,
                    })
                }
                ClusterStatus::Running | ClusterStatus::Unknown => {
                    return Err(LifecycleError::AlreadyExists(name.to_string()))
                }
                ClusterStatus::Error => {
                    info!(cluster = name, "re-creating cluster left in error state");
                }
            }
        }

        let record = ClusterRecord::new(name, provider);
        self.persist(&record)?;
        info!(cluster = name, provider = %provider, "cluster creating");

        let provisioned = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled(name, Operation::Create)),
            result = self.provision(driver.as_ref(), name, options) => result,
        };

        match provisioned {
            Ok(()) => {}
            Err(ProviderError::AlreadyExists(_)) => {
                // Somebody else owns this name on the provider side.
                match previous {
                    Some(previous) => self.persist(&previous)?,
                    None => {
                        self.registry.remove(name);
                        self.store.remove(name)?;
                    }
                }
                return Err(LifecycleError::AlreadyExists(name.to_string()));
            }
            Err(e) => {
                self.mark_error(name, provider, &e.to_string());
                return Err(LifecycleError::provider(name, Operation::Create, e));
            }
        }

        let verified = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled(name, Operation::Create)),
            result = self.verify(driver.as_ref(), name) => result,
        };
        if let Err(reason) = verified {
            warn!(cluster = name, %reason, "cluster created but not reachable");
            self.mark_error(name, provider, &reason);
            return Err(LifecycleError::Verification {
                name: name.to_string(),
                reason,
            });
        }

        let details = driver.get_details(name).await.ok();
        let record = self.update_or_insert(name, provider, |record| {
            record.status = ClusterStatus::Running;
            record.provider_metadata.remove(META_LAST_ERROR);
            if let Some(details) = &details {
                apply_details(record, details);
            }
        });
        self.store.save(&record)?;
        info!(cluster = name, provider = %provider, "cluster running");
        Ok(record)
    }

    pub async fn delete(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        validate_cluster_name(name).map_err(|_| LifecycleError::InvalidName(name.to_string()))?;
        let _guard = self.acquire(name, Operation::Delete, cancel).await?;

        let record = self
            .registry
            .get(name)
            .ok_or_else(|| LifecycleError::NotFound(name.to_string()))?;

        let Some(driver) = self.drivers.get(record.provider) else {
            warn!(cluster = name, provider = %record.provider, "no driver for provider, removing local record only");
            self.forget(name)?;
            return Ok(());
        };

        if let Some(record) = self.registry.update(name, |r| r.status = ClusterStatus::Deleting) {
            self.store.save(&record)?;
        }
        info!(cluster = name, provider = %record.provider, "cluster deleting");

        let removed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled(name, Operation::Delete)),
            result = self.deprovision(driver.as_ref(), name) => result,
        };

        match removed {
            Ok(()) => {}
            Err(ProviderError::NotFound(_)) => {
                info!(cluster = name, "cluster already gone on the provider side");
            }
            Err(e) => {
                self.mark_error(name, record.provider, &e.to_string());
                return Err(LifecycleError::provider(name, Operation::Delete, e));
            }
        }

        self.forget(name)?;
        info!(cluster = name, "cluster deleted");
        Ok(())
    }

    pub async fn details(&self, name: &str) -> Result<ClusterDetails> {
        let (record, driver) = self.resolve(name)?;

        match driver.get_details(name).await {
            Ok(details) => {
                self.observe(name, |r| {
                    r.status = details.status;
                    apply_details(r, &details);
                });
                Ok(details)
            }
            Err(e) => {
                if matches!(e, ProviderError::NotFound(_)) {
                    self.observe(name, |r| r.status = ClusterStatus::Unknown);
                }
                Err(LifecycleError::provider(
                    record.name,
                    Operation::Details,
                    e,
                ))
            }
        }
    }

    pub async fn kubeconfig(&self, name: &str) -> Result<Vec<u8>> {
        let (record, driver) = self.resolve(name)?;

        driver.get_kubeconfig(name).await.map_err(|e| {
            if matches!(e, ProviderError::NotFound(_)) {
                self.observe(name, |r| r.status = ClusterStatus::Unknown);
            }
            LifecycleError::provider(record.name, Operation::Kubeconfig, e)
        })
    }

    pub async fn k8s_details(&self, name: &str) -> Result<K8sDetails> {
        let (record, _) = self.resolve(name)?;
        let client = self.kube_client(name).await?;

        let server_version = client
            .server_version()
            .await
            .map_err(|e| LifecycleError::kubernetes(name, e))?;
        let nodes = client
            .nodes()
            .await
            .map_err(|e| LifecycleError::kubernetes(name, e))?;

        Ok(K8sDetails {
            name: record.name,
            provider: record.provider,
            server_version,
            nodes,
        })
    }

    pub async fn apps(&self, name: &str) -> Result<Vec<WorkloadSummary>> {
        let client = self.kube_client(name).await?;
        client
            .workloads()
            .await
            .map_err(|e| LifecycleError::kubernetes(name, e))
    }

    pub async fn helm_releases(&self, name: &str) -> Result<Vec<HelmRelease>> {
        let kubeconfig = self.kubeconfig(name).await?;

        let path = self
            .store
            .cluster_dir(name)
            .join(HELM_KUBECONFIG_FILE_NAME);
        write_atomic(&path, &kubeconfig).map_err(|e| StateError::io(&path, e))?;
        let releases = self.helm.list_releases(&path).await;
        if let Err(e) = std::fs::remove_file(&path) {
            debug!(path = %path.display(), error = %e, "failed to remove temporary kubeconfig");
        }

        releases.map_err(|e| LifecycleError::provider(name, Operation::HelmList, e))
    }

    fn driver(&self, provider: ProviderKind) -> Result<Arc<dyn ProviderDriver>> {
        self.drivers
            .get(provider)
            .ok_or(LifecycleError::UnsupportedProvider(provider))
    }

    fn resolve(&self, name: &str) -> Result<(ClusterRecord, Arc<dyn ProviderDriver>)> {
        validate_cluster_name(name).map_err(|_| LifecycleError::InvalidName(name.to_string()))?;
        let record = self
            .registry
            .get(name)
            .ok_or_else(|| LifecycleError::NotFound(name.to_string()))?;
        let driver = self.driver(record.provider)?;
        Ok((record, driver))
    }

    async fn kube_client(&self, name: &str) -> Result<ClusterKubeClient> {
        let kubeconfig = self.kubeconfig(name).await?;
        ClusterKubeClient::from_kubeconfig(&kubeconfig)
            .await
            .map_err(|e| LifecycleError::kubernetes(name, e))
    }

    async fn acquire(
        &self,
        name: &str,
        operation: Operation,
        cancel: &CancellationToken,
    ) -> Result<OwnedMutexGuard<()>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LifecycleError::Cancelled {
                name: name.to_string(),
                operation,
            }),
            guard = self.locks.acquire(name) => Ok(guard),
        }
    }

    async fn provision(
        &self,
        driver: &dyn ProviderDriver,
        name: &str,
        options: &CreateOptions,
    ) -> std::result::Result<(), ProviderError> {
        let timed_out = AtomicBool::new(false);
        let timed_out = &timed_out;

        (|| async move {
            match driver.create_cluster(name, options).await {
                // The timed out attempt finished provisioning after all.
                Err(ProviderError::AlreadyExists(_)) if timed_out.load(Ordering::SeqCst) => {
                    info!(cluster = name, "cluster exists after an earlier timeout, verifying it");
                    Ok(())
                }
                Err(e @ ProviderError::Timeout { .. }) => {
                    timed_out.store(true, Ordering::SeqCst);
                    Err(e)
                }
                other => other,
            }
        })
        .retry(self.retry.backoff())
        .when(ProviderError::is_transient)
        .notify(|e, delay| {
            warn!(cluster = name, error = %e, delay_ms = delay.as_millis() as u64, "create failed, retrying");
        })
        .await
    }

    async fn deprovision(
        &self,
        driver: &dyn ProviderDriver,
        name: &str,
    ) -> std::result::Result<(), ProviderError> {
        (|| async move { driver.delete_cluster(name).await })
            .retry(self.retry.backoff())
            .when(ProviderError::is_transient)
            .notify(|e, delay| {
                warn!(cluster = name, error = %e, delay_ms = delay.as_millis() as u64, "delete failed, retrying");
            })
            .await
    }

    /// Fetch the kubeconfig and run the readiness probe against it.
    async fn verify(&self, driver: &dyn ProviderDriver, name: &str) -> std::result::Result<(), String> {
        let kubeconfig = driver
            .get_kubeconfig(name)
            .await
            .map_err(|e| format!("cannot fetch kubeconfig: {}", e))?;
        self.probe
            .check(name, &kubeconfig)
            .await
            .map_err(|e| e.to_string())
    }

    fn persist(&self, record: &ClusterRecord) -> Result<()> {
        self.store.save(record)?;
        self.registry.upsert(record.clone());
        Ok(())
    }

    fn forget(&self, name: &str) -> Result<()> {
        self.registry.remove(name);
        self.store.purge(name)?;
        Ok(())
    }

    /// Apply `f` to the record of `name`, recreating it if it went missing.
    fn update_or_insert<F>(&self, name: &str, provider: ProviderKind, f: F) -> ClusterRecord
    where
        F: FnOnce(&mut ClusterRecord),
    {
        let mut record = self
            .registry
            .get(name)
            .unwrap_or_else(|| ClusterRecord::new(name, provider));
        f(&mut record);
        self.registry.upsert(record.clone());
        record
    }

    /// Record a failure. The record is kept so the inconsistency stays visible.
    fn mark_error(&self, name: &str, provider: ProviderKind, reason: &str) {
        let record = self.update_or_insert(name, provider, |r| {
            r.status = ClusterStatus::Error;
            r.set_metadata(META_LAST_ERROR, reason);
        });
        if let Err(e) = self.store.save(&record) {
            warn!(cluster = name, error = %e, "failed to persist error state");
        }
        warn!(cluster = name, %reason, "cluster in error state");
    }

    fn cancelled(&self, name: &str, operation: Operation) -> LifecycleError {
        warn!(cluster = name, %operation, "operation cancelled, record left in its transient state");
        LifecycleError::Cancelled {
            name: name.to_string(),
            operation,
        }
    }

    /// Status update from a read-only call; skipped while another operation owns the name.
    fn observe<F>(&self, name: &str, f: F)
    where
        F: FnOnce(&mut ClusterRecord),
    {
        let Some(_guard) = self.locks.try_acquire(name) else {
            return;
        };
        let Some(before) = self.registry.get(name) else {
            return;
        };
        let mut after = before.clone();
        f(&mut after);
        if after == before {
            return;
        }
        self.registry.upsert(after.clone());
        if let Err(e) = self.store.save(&after) {
            warn!(cluster = name, error = %e, "failed to persist observed status");
        }
    }
}

fn apply_details(record: &mut ClusterRecord, details: &ClusterDetails) {
    if let Some(nodes) = details.node_count {
        record.set_metadata(META_NODE_COUNT, nodes.to_string());
    }
    if let Some(version) = &details.kubernetes_version {
        record.set_metadata(META_KUBERNETES_VERSION, version.clone());
    }
}
