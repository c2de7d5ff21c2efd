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

//! k3s driver, backed by the `k3d` CLI.

use super::{version_from_image, CreateOptions, DriverContext, ListedCluster, ProviderDriver};
use crate::domain::cluster::{validate_cluster_name, ClusterDetails, ClusterStatus, ProviderKind};
use crate::infrastructure::constants::COMMAND_GRACE;
use crate::infrastructure::process::{args, run_checked};
use crate::shared::error::ProviderError;
use serde::Deserialize;
use tracing::info;

const K3D: &str = "k3d";

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct K3dCluster {
    name: String,
    servers_count: u32,
    servers_running: u32,
    agents_count: u32,
    nodes: Vec<K3dNode>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct K3dNode {
    role: String,
    image: String,
}

impl K3dCluster {
    fn raw_status(&self) -> &'static str {
        if self.servers_count > 0 && self.servers_running == self.servers_count {
            "running"
        } else if self.servers_running > 0 {
            "starting"
        } else {
            "stopped"
        }
    }

    fn kubernetes_version(&self) -> Option<String> {
        self.nodes
            .iter()
            .filter(|n| n.role == "server")
            .find_map(|n| version_from_image(&n.image))
    }
}

pub struct K3sDriver {
    ctx: DriverContext,
}

impl K3sDriver {
    pub fn new(ctx: DriverContext) -> Self {
        Self { ctx }
    }

    async fn clusters(&self) -> Result<Vec<K3dCluster>, ProviderError> {
        let output = run_checked(
            self.ctx.runner.as_ref(),
            K3D,
            &args(["cluster", "list", "-o", "json"]),
            self.ctx.query_timeout,
        )
        .await?;

        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(stdout)
            .map_err(|e| ProviderError::Unknown(format!("unexpected k3d cluster list output: {}", e)))
    }

    async fn find(&self, name: &str) -> Result<K3dCluster, ProviderError> {
        self.clusters()
            .await?
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ProviderError::NotFound(name.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderDriver for K3sDriver {
    fn kind(&self) -> ProviderKind {
        ProviderKind::K3s
    }

    async fn list_clusters(&self) -> Result<Vec<ListedCluster>, ProviderError> {
        Ok(self
            .clusters()
            .await?
            .into_iter()
            .map(|c| {
                let status = c.raw_status().to_string();
                (c.name, status)
            })
            .collect())
    }

    async fn create_cluster(
        &self,
        name: &str,
        options: &CreateOptions,
    ) -> Result<(), ProviderError> {
        validate_cluster_name(name)?;
        if self.clusters().await?.iter().any(|c| c.name == name) {
            return Err(ProviderError::AlreadyExists(name.to_string()));
        }

        let mut cmd = args(["cluster", "create", name, "--wait"]);
        cmd.push("--timeout".to_string());
        cmd.push(format!("{}s", options.wait.as_secs()));
        if let Some(workers) = options.workers {
            cmd.push("--agents".to_string());
            cmd.push(workers.to_string());
        }
        if let Some(tag) = options.version_tag() {
            cmd.push("--image".to_string());
            cmd.push(format!("rancher/k3s:{}-k3s1", tag));
        }

        info!(cluster = name, "creating k3d cluster");
        run_checked(
            self.ctx.runner.as_ref(),
            K3D,
            &cmd,
            options.wait + COMMAND_GRACE,
        )
        .await?;
        Ok(())
    }

    async fn delete_cluster(&self, name: &str) -> Result<(), ProviderError> {
        validate_cluster_name(name)?;
        self.find(name).await?;

        info!(cluster = name, "deleting k3d cluster");
        run_checked(
            self.ctx.runner.as_ref(),
            K3D,
            &args(["cluster", "delete", name]),
            self.ctx.delete_timeout,
        )
        .await?;
        Ok(())
    }

    async fn get_kubeconfig(&self, name: &str) -> Result<Vec<u8>, ProviderError> {
        validate_cluster_name(name)?;
        self.find(name).await?;

        let output = run_checked(
            self.ctx.runner.as_ref(),
            K3D,
            &args(["kubeconfig", "get", name]),
            self.ctx.query_timeout,
        )
        .await?;
        Ok(output.stdout.into_bytes())
    }

    async fn get_details(&self, name: &str) -> Result<ClusterDetails, ProviderError> {
        validate_cluster_name(name)?;
        let cluster = self.find(name).await?;

        let mut details = ClusterDetails::new(
            name,
            ProviderKind::K3s,
            ClusterStatus::from_raw(cluster.raw_status()),
        );
        details.node_count = Some(cluster.servers_count + cluster.agents_count);
        details.kubernetes_version = cluster.kubernetes_version();
        Ok(details)
    }
}
