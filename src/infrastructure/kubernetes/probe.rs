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

//! Post-create reachability check

use super::client::ClusterKubeClient;
use crate::infrastructure::constants::PROBE_TIMEOUT;
use crate::shared::error::KubeError;
use std::time::Duration;
use tracing::debug;

/// Decides whether a freshly provisioned cluster actually serves its API.
#[async_trait::async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn check(&self, name: &str, kubeconfig: &[u8]) -> Result<(), KubeError>;
}

/// Asks the API server for its version and requires at least one registered node.
#[derive(Debug, Clone)]
pub struct ApiServerProbe {
    timeout: Duration,
}

impl Default for ApiServerProbe {
    fn default() -> Self {
        Self {
            timeout: PROBE_TIMEOUT,
        }
    }
}

impl ApiServerProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait]
impl ReadinessProbe for ApiServerProbe {
    async fn check(&self, name: &str, kubeconfig: &[u8]) -> Result<(), KubeError> {
        let probe = async {
            let client = ClusterKubeClient::from_kubeconfig(kubeconfig).await?;
            let version = client.server_version().await?;
            let nodes = client.nodes().await?;
            debug!(cluster = name, %version, nodes = nodes.len(), "API server answered");
            if nodes.is_empty() {
                return Err(KubeError::NotReady("no nodes registered".to_string()));
            }
            Ok::<(), KubeError>(())
        };

        tokio::time::timeout(self.timeout, probe)
            .await
            .map_err(|_| KubeError::Timeout(self.timeout.as_secs()))?
    }
}
