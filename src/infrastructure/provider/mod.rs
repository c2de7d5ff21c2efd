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

//! Provider drivers
//!
//! Every local Kubernetes distribution is wrapped by one [`ProviderDriver`].
//! The set of providers is closed ([`ProviderKind`]) and [`ProviderDrivers`]
//! holds at most one driver per kind.

pub mod k3s;
pub mod kind;
pub mod minikube;
pub mod talos;

pub use k3s::K3sDriver;
pub use kind::KindDriver;
pub use minikube::MinikubeDriver;
pub use talos::TalosDriver;

use crate::domain::cluster::{ClusterDetails, ProviderKind};
use crate::infrastructure::constants::{DEFAULT_CREATE_WAIT, DELETE_TIMEOUT, QUERY_TIMEOUT};
use crate::infrastructure::process::{CommandRunner, SystemCommandRunner};
use crate::shared::error::ProviderError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Knobs for provisioning a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOptions {
    /// Kubernetes version, e.g. `1.30.0` (a leading `v` is accepted).
    pub kubernetes_version: Option<String>,
    /// Number of worker nodes in addition to the control plane.
    pub workers: Option<u32>,
    /// How long the provider may take to report readiness.
    pub wait: Duration,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            kubernetes_version: None,
            workers: None,
            wait: DEFAULT_CREATE_WAIT,
        }
    }
}

impl CreateOptions {
    /// Version with a leading `v`, the form most provider images are tagged with.
    pub fn version_tag(&self) -> Option<String> {
        self.kubernetes_version.as_ref().map(|v| {
            let v = v.trim();
            if v.starts_with('v') {
                v.to_string()
            } else {
                format!("v{}", v)
            }
        })
    }
}

/// One live cluster as reported by a provider: name and the provider's own status word.
pub type ListedCluster = (String, String);

#[async_trait::async_trait]
pub trait ProviderDriver: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Clusters currently known to the provider. Empty when there are none;
    /// `Unavailable` when the provider's tooling is missing.
    async fn list_clusters(&self) -> Result<Vec<ListedCluster>, ProviderError>;

    /// Provision `name` and block until ready or the provider's timeout elapses.
    ///
    /// On `Timeout` the cluster may still be coming up; callers reconcile
    /// instead of assuming a rollback.
    async fn create_cluster(&self, name: &str, options: &CreateOptions)
        -> Result<(), ProviderError>;

    async fn delete_cluster(&self, name: &str) -> Result<(), ProviderError>;

    async fn get_kubeconfig(&self, name: &str) -> Result<Vec<u8>, ProviderError>;

    async fn get_details(&self, name: &str) -> Result<ClusterDetails, ProviderError>;
}

/// Shared plumbing handed to each system driver.
#[derive(Clone)]
pub struct DriverContext {
    pub runner: Arc<dyn CommandRunner>,
    /// `<home>/clusters`, for drivers that keep files next to the cluster records.
    pub state_dir: PathBuf,
    pub query_timeout: Duration,
    pub delete_timeout: Duration,
}

impl DriverContext {
    pub fn new(runner: Arc<dyn CommandRunner>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            state_dir: state_dir.into(),
            query_timeout: QUERY_TIMEOUT,
            delete_timeout: DELETE_TIMEOUT,
        }
    }

    pub fn cluster_dir(&self, name: &str) -> PathBuf {
        self.state_dir.join(name)
    }
}

/// The registered drivers, in the order their listings take precedence.
#[derive(Clone, Default)]
pub struct ProviderDrivers {
    drivers: Vec<Arc<dyn ProviderDriver>>,
}

impl ProviderDrivers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drivers for every supported provider, backed by the real CLIs.
    pub fn system(state_dir: impl Into<PathBuf>) -> Self {
        let ctx = DriverContext::new(Arc::new(SystemCommandRunner), state_dir);
        Self::with_context(ctx)
    }

    pub fn with_context(ctx: DriverContext) -> Self {
        Self::new()
            .register(Arc::new(TalosDriver::new(ctx.clone())))
            .register(Arc::new(KindDriver::new(ctx.clone())))
            .register(Arc::new(K3sDriver::new(ctx.clone())))
            .register(Arc::new(MinikubeDriver::new(ctx)))
    }

    /// Add a driver, replacing any earlier driver of the same kind.
    pub fn register(mut self, driver: Arc<dyn ProviderDriver>) -> Self {
        self.drivers.retain(|d| d.kind() != driver.kind());
        self.drivers.push(driver);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ProviderDriver>> {
        self.drivers.iter().find(|d| d.kind() == kind).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ProviderDriver>> {
        self.drivers.iter()
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.drivers.iter().map(|d| d.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

/// Pull the version tag out of an image reference such as
/// `kindest/node:v1.29.2@sha256:...`.
pub(crate) fn version_from_image(image: &str) -> Option<String> {
    let without_digest = image.split('@').next()?;
    let (_, tag) = without_digest.rsplit_once(':')?;
    let tag = tag.trim();
    if tag.starts_with('v') {
        Some(tag.split("-k3s").next().unwrap_or(tag).to_string())
    } else {
        None
    }
}
