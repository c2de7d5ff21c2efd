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

use crate::shared::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Metadata keys recorded in `ClusterRecord::provider_metadata`.
pub const META_NODE_COUNT: &str = "nodes";
pub const META_KUBERNETES_VERSION: &str = "kubernetesVersion";
pub const META_LAST_ERROR: &str = "lastError";

/// Local Kubernetes distributions a cluster can be provisioned with.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Talos,
    Kind,
    K3s,
    Minikube,
    /// Label for clusters found on disk whose provider could not be determined.
    Unknown,
}

impl ProviderKind {
    /// Providers that can be selected and have a driver.
    pub const SUPPORTED: [ProviderKind; 4] = [
        ProviderKind::Talos,
        ProviderKind::Kind,
        ProviderKind::K3s,
        ProviderKind::Minikube,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Talos => "talos",
            ProviderKind::Kind => "kind",
            ProviderKind::K3s => "k3s",
            ProviderKind::Minikube => "minikube",
            ProviderKind::Unknown => "unknown",
        }
    }

    /// Lenient parse for labels read from disk; anything unrecognized is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(ProviderKind::Unknown)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "talos" => Ok(ProviderKind::Talos),
            "kind" => Ok(ProviderKind::Kind),
            "k3s" | "k3d" => Ok(ProviderKind::K3s),
            "minikube" => Ok(ProviderKind::Minikube),
            _ => Err(ConfigError::UnknownProvider(s.to_string())),
        }
    }
}

/// Lifecycle state of a tracked cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    Creating,
    Running,
    Deleting,
    Error,
    Unknown,
}

impl ClusterStatus {
    /// A create or delete has been started and not yet settled.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClusterStatus::Creating | ClusterStatus::Deleting)
    }

    /// Map a provider's own status wording onto the lifecycle states.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "running" | "ready" | "ok" | "up" => ClusterStatus::Running,
            "creating" | "starting" | "pending" | "provisioning" | "created" => {
                ClusterStatus::Creating
            }
            "deleting" | "terminating" | "removing" => ClusterStatus::Deleting,
            "error" | "failed" | "misconfigured" | "dead" => ClusterStatus::Error,
            _ => ClusterStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterStatus::Creating => "creating",
            ClusterStatus::Running => "running",
            ClusterStatus::Deleting => "deleting",
            ClusterStatus::Error => "error",
            ClusterStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracked metadata for one locally managed cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    pub name: String,
    pub provider: ProviderKind,
    pub status: ClusterStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider_metadata: BTreeMap<String, String>,
}

impl ClusterRecord {
    /// A freshly accepted create request.
    pub fn new(name: impl Into<String>, provider: ProviderKind) -> Self {
        Self::with_status(name, provider, ClusterStatus::Creating)
    }

    pub fn with_status(
        name: impl Into<String>,
        provider: ProviderKind,
        status: ClusterStatus,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            status,
            created_at: Utc::now(),
            provider_metadata: BTreeMap::new(),
        }
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<String>) {
        self.provider_metadata.insert(key.to_string(), value.into());
    }
}

/// Provider-reported details of a single cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDetails {
    pub name: String,
    pub provider: ProviderKind,
    pub status: ClusterStatus,
    pub node_count: Option<u32>,
    pub kubernetes_version: Option<String>,
}

impl ClusterDetails {
    pub fn new(name: impl Into<String>, provider: ProviderKind, status: ClusterStatus) -> Self {
        Self {
            name: name.into(),
            provider,
            status,
            node_count: None,
            kubernetes_version: None,
        }
    }
}
