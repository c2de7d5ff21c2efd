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

use crate::domain::cluster::{ClusterStatus, ProviderKind};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Failures of the user configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error on config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown provider '{0}' (expected one of: talos, kind, k3s, minikube)")]
    UnknownProvider(String),

    #[error("cannot determine the home directory; set K8SLOCAL_HOME or pass --home")]
    NoHomeDir,
}

impl ConfigError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures of the per-cluster state directory.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("I/O error on cluster state '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize cluster record '{name}': {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl StateError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures reported by a provider driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider tooling '{tool}' is unavailable: {reason}")]
    Unavailable { tool: String, reason: String },

    #[error("invalid cluster name '{0}': must be a lowercase DNS label (a-z, 0-9, '-', at most 63 characters)")]
    InvalidName(String),

    #[error("cluster '{0}' already exists")]
    AlreadyExists(String),

    #[error("cluster '{0}' not found")]
    NotFound(String),

    #[error("'{operation}' did not finish within {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("transient failure: {0}")]
    TransientFailure(String),

    #[error("{0}")]
    Unknown(String),
}

impl ProviderError {
    pub fn unavailable(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Errors worth another attempt: timeouts and connectivity blips.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::TransientFailure(_))
    }
}

/// Failures talking to a cluster's Kubernetes API.
#[derive(Error, Debug)]
pub enum KubeError {
    #[error("invalid kubeconfig: {0}")]
    Kubeconfig(String),

    #[error("Kubernetes API error: {0}")]
    Api(String),

    #[error("cluster is not ready: {0}")]
    NotReady(String),

    #[error("Kubernetes API did not answer within {0}s")]
    Timeout(u64),
}

impl From<kube::Error> for KubeError {
    fn from(err: kube::Error) -> Self {
        KubeError::Api(err.to_string())
    }
}

impl From<kube::config::KubeconfigError> for KubeError {
    fn from(err: kube::config::KubeconfigError) -> Self {
        KubeError::Kubeconfig(err.to_string())
    }
}

/// Lifecycle operation names used in error context and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Delete,
    Details,
    Kubeconfig,
    HelmList,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Delete => "delete",
            Operation::Details => "details",
            Operation::Kubeconfig => "kubeconfig",
            Operation::HelmList => "helm list",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("cluster '{name}' has an operation in progress (status: {status})")]
    AlreadyInProgress { name: String, status: ClusterStatus },

    #[error("cluster '{0}' already exists")]
    AlreadyExists(String),

    #[error("cluster '{0}' not found")]
    NotFound(String),

    #[error("invalid cluster name '{0}': must be a lowercase DNS label (a-z, 0-9, '-', at most 63 characters)")]
    InvalidName(String),

    #[error("no driver available for provider '{0}'")]
    UnsupportedProvider(ProviderKind),

    #[error("{operation} of cluster '{name}' failed: {source}")]
    Provider {
        name: String,
        operation: Operation,
        #[source]
        source: ProviderError,
    },

    #[error("cluster '{name}' was created but is not reachable: {reason}")]
    Verification { name: String, reason: String },

    #[error("{operation} of cluster '{name}' was cancelled")]
    Cancelled { name: String, operation: Operation },

    #[error("Kubernetes API error for cluster '{name}': {source}")]
    Kubernetes {
        name: String,
        #[source]
        source: KubeError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),
}

impl LifecycleError {
    pub fn provider(name: impl Into<String>, operation: Operation, source: ProviderError) -> Self {
        Self::Provider {
            name: name.into(),
            operation,
            source,
        }
    }

    pub fn kubernetes(name: impl Into<String>, source: KubeError) -> Self {
        Self::Kubernetes {
            name: name.into(),
            source,
        }
    }

    /// The underlying driver error, if this failure came from a provider.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider { source, .. } => Some(source),
            _ => None,
        }
    }
}
