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

//! Kind (Kubernetes in Docker) driver, backed by the `kind` CLI.

use super::{version_from_image, CreateOptions, DriverContext, ListedCluster, ProviderDriver};
use crate::domain::cluster::{validate_cluster_name, ClusterDetails, ClusterStatus, ProviderKind};
use crate::infrastructure::constants::COMMAND_GRACE;
use crate::infrastructure::fs::write_atomic;
use crate::infrastructure::process::{args, run_checked};
use crate::shared::error::ProviderError;
use tracing::{debug, info};

const KIND: &str = "kind";
const DOCKER: &str = "docker";

pub struct KindDriver {
    ctx: DriverContext,
}

impl KindDriver {
    pub fn new(ctx: DriverContext) -> Self {
        Self { ctx }
    }

    async fn cluster_names(&self) -> Result<Vec<String>, ProviderError> {
        // "No kind clusters found." goes to stderr with an empty stdout.
        let output = run_checked(
            self.ctx.runner.as_ref(),
            KIND,
            &args(["get", "clusters"]),
            self.ctx.query_timeout,
        )
        .await?;

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn ensure_exists(&self, name: &str) -> Result<(), ProviderError> {
        if self.cluster_names().await?.iter().any(|n| n == name) {
            Ok(())
        } else {
            Err(ProviderError::NotFound(name.to_string()))
        }
    }

    /// Multi-node layouts need a kind config file.
    fn write_node_config(&self, name: &str, workers: u32) -> Result<String, ProviderError> {
        let mut config = String::from(
            "kind: Cluster\napiVersion: kind.x-k8s.io/v1alpha4\nnodes:\n- role: control-plane\n",
        );
        for _ in 0..workers {
            config.push_str("- role: worker\n");
        }

        let path = self.ctx.cluster_dir(name).join("kind-config.yaml");
        write_atomic(&path, config.as_bytes()).map_err(|e| {
            ProviderError::Unknown(format!(
                "failed to write kind config '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(path.to_string_lossy().into_owned())
    }
}

#[async_trait::async_trait]
impl ProviderDriver for KindDriver {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Kind
    }

    async fn list_clusters(&self) -> Result<Vec<ListedCluster>, ProviderError> {
        // Kind only knows about clusters whose node containers exist.
        Ok(self
            .cluster_names()
            .await?
            .into_iter()
            .map(|name| (name, "running".to_string()))
            .collect())
    }

    async fn create_cluster(
        &self,
        name: &str,
        options: &CreateOptions,
    ) -> Result<(), ProviderError> {
        validate_cluster_name(name)?;
        if self.cluster_names().await?.iter().any(|n| n == name) {
            return Err(ProviderError::AlreadyExists(name.to_string()));
        }

        let mut cmd = args(["create", "cluster", "--name", name]);
        cmd.push("--wait".to_string());
        cmd.push(format!("{}s", options.wait.as_secs()));
        if let Some(tag) = options.version_tag() {
            cmd.push("--image".to_string());
            cmd.push(format!("kindest/node:{}", tag));
        }
        if let Some(workers) = options.workers.filter(|w| *w > 0) {
            let config = self.write_node_config(name, workers)?;
            cmd.push("--config".to_string());
            cmd.push(config);
        }

        info!(cluster = name, "creating kind cluster");
        run_checked(
            self.ctx.runner.as_ref(),
            KIND,
            &cmd,
            options.wait + COMMAND_GRACE,
        )
        .await?;
        Ok(())
    }

    async fn delete_cluster(&self, name: &str) -> Result<(), ProviderError> {
        validate_cluster_name(name)?;
        self.ensure_exists(name).await?;

        info!(cluster = name, "deleting kind cluster");
        run_checked(
            self.ctx.runner.as_ref(),
            KIND,
            &args(["delete", "cluster", "--name", name]),
            self.ctx.delete_timeout,
        )
        .await?;
        Ok(())
    }

    async fn get_kubeconfig(&self, name: &str) -> Result<Vec<u8>, ProviderError> {
        validate_cluster_name(name)?;
        self.ensure_exists(name).await?;

        let output = run_checked(
            self.ctx.runner.as_ref(),
            KIND,
            &args(["get", "kubeconfig", "--name", name]),
            self.ctx.query_timeout,
        )
        .await?;
        Ok(output.stdout.into_bytes())
    }

    async fn get_details(&self, name: &str) -> Result<ClusterDetails, ProviderError> {
        validate_cluster_name(name)?;
        self.ensure_exists(name).await?;

        let mut details = ClusterDetails::new(name, ProviderKind::Kind, ClusterStatus::Running);

        let nodes = run_checked(
            self.ctx.runner.as_ref(),
            KIND,
            &args(["get", "nodes", "--name", name]),
            self.ctx.query_timeout,
        )
        .await?;
        let node_names: Vec<&str> = nodes
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        details.node_count = Some(node_names.len() as u32);

        // The node image tag carries the Kubernetes version.
        if let Some(node) = node_names.first() {
            let image = self
                .ctx
                .runner
                .run(
                    DOCKER,
                    &args(["inspect", "--format", "{{.Config.Image}}", node]),
                    self.ctx.query_timeout,
                )
                .await;
            match image {
                Ok(out) if out.success() => {
                    details.kubernetes_version = version_from_image(out.stdout.trim());
                }
                Ok(out) => debug!(cluster = name, stderr = %out.stderr.trim(), "docker inspect failed"),
                Err(e) => debug!(cluster = name, error = %e, "docker inspect unavailable"),
            }
        }

        Ok(details)
    }
}
