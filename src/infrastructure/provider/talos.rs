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

//! Talos driver using the `talosctl` docker provisioner.
//!
//! Talos has no "list clusters" command, so live clusters are discovered from
//! the labels the provisioner puts on its node containers. The talosconfig and
//! kubeconfig of each cluster live in `<home>/clusters/<name>/`.

use super::{CreateOptions, DriverContext, ListedCluster, ProviderDriver};
use crate::domain::cluster::{validate_cluster_name, ClusterDetails, ClusterStatus, ProviderKind};
use crate::infrastructure::constants::{
    COMMAND_GRACE, KUBECONFIG_FILE_NAME, LEGACY_PROVIDER_FILE_NAME, TALOSCONFIG_FILE_NAME,
    TALOS_CLUSTER_LABEL, TALOS_CONTROL_PLANE_IP, TALOS_OWNED_LABEL,
};
use crate::infrastructure::fs::write_atomic;
use crate::infrastructure::process::{args, run_checked};
use crate::shared::error::ProviderError;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

const TALOSCTL: &str = "talosctl";
const DOCKER: &str = "docker";

/// Node container states grouped per Talos cluster.
#[derive(Debug, Default)]
struct TalosNodes {
    total: u32,
    running: u32,
}

impl TalosNodes {
    fn raw_status(&self) -> &'static str {
        if self.total > 0 && self.running == self.total {
            "running"
        } else if self.running > 0 {
            "degraded"
        } else {
            "stopped"
        }
    }
}

pub struct TalosDriver {
    ctx: DriverContext,
}

impl TalosDriver {
    pub fn new(ctx: DriverContext) -> Self {
        Self { ctx }
    }

    fn path_arg(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    async fn clusters(&self) -> Result<BTreeMap<String, TalosNodes>, ProviderError> {
        let format = format!("{{{{.Label \"{}\"}}}} {{{{.State}}}}", TALOS_CLUSTER_LABEL);
        let output = run_checked(
            self.ctx.runner.as_ref(),
            DOCKER,
            &args([
                "ps",
                "-a",
                "--filter",
                &format!("label={}", TALOS_OWNED_LABEL),
                "--format",
                &format,
            ]),
            self.ctx.query_timeout,
        )
        .await?;

        let mut clusters: BTreeMap<String, TalosNodes> = BTreeMap::new();
        for line in output.stdout.lines() {
            let mut parts = line.split_whitespace();
            let (Some(name), Some(state)) = (parts.next(), parts.next()) else {
                continue;
            };
            let nodes = clusters.entry(name.to_string()).or_default();
            nodes.total += 1;
            if state == "running" {
                nodes.running += 1;
            }
        }
        Ok(clusters)
    }

    async fn find(&self, name: &str) -> Result<TalosNodes, ProviderError> {
        self.clusters()
            .await?
            .remove(name)
            .ok_or_else(|| ProviderError::NotFound(name.to_string()))
    }

    fn write_marker(&self, name: &str) -> Result<(), ProviderError> {
        let marker = self.ctx.cluster_dir(name).join(LEGACY_PROVIDER_FILE_NAME);
        write_atomic(&marker, ProviderKind::Talos.as_str().as_bytes()).map_err(|e| {
            ProviderError::Unknown(format!("failed to write '{}': {}", marker.display(), e))
        })
    }

    fn remove_local_files(&self, name: &str) {
        let dir = self.ctx.cluster_dir(name);
        for file in [
            TALOSCONFIG_FILE_NAME,
            KUBECONFIG_FILE_NAME,
            LEGACY_PROVIDER_FILE_NAME,
        ] {
            let path = dir.join(file);
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove talos file");
                }
            }
        }
        let _ = std::fs::remove_dir_all(dir.join(name));
    }
}

#[async_trait::async_trait]
impl ProviderDriver for TalosDriver {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Talos
    }

    async fn list_clusters(&self) -> Result<Vec<ListedCluster>, ProviderError> {
        Ok(self
            .clusters()
            .await?
            .into_iter()
            .map(|(name, nodes)| (name, nodes.raw_status().to_string()))
            .collect())
    }

    async fn create_cluster(
        &self,
        name: &str,
        options: &CreateOptions,
    ) -> Result<(), ProviderError> {
        validate_cluster_name(name)?;
        if self.clusters().await?.contains_key(name) {
            return Err(ProviderError::AlreadyExists(name.to_string()));
        }

        let dir = self.ctx.cluster_dir(name);
        self.write_marker(name)?;

        let mut cmd = args(["cluster", "create", "--name", name, "--provisioner", "docker"]);
        cmd.push("--state".to_string());
        cmd.push(Self::path_arg(&dir));
        cmd.push("--talosconfig".to_string());
        cmd.push(Self::path_arg(&dir.join(TALOSCONFIG_FILE_NAME)));
        cmd.push("--wait".to_string());
        cmd.push(format!("--wait-timeout={}s", options.wait.as_secs()));
        if let Some(workers) = options.workers {
            cmd.push(format!("--workers={}", workers));
        }
        if let Some(version) = &options.kubernetes_version {
            cmd.push(format!(
                "--kubernetes-version={}",
                version.trim().trim_start_matches('v')
            ));
        }

        info!(cluster = name, "creating talos cluster");
        run_checked(
            self.ctx.runner.as_ref(),
            TALOSCTL,
            &cmd,
            options.wait + COMMAND_GRACE,
        )
        .await?;
        Ok(())
    }

    async fn delete_cluster(&self, name: &str) -> Result<(), ProviderError> {
        validate_cluster_name(name)?;
        self.find(name).await?;

        let dir = self.ctx.cluster_dir(name);
        let mut cmd = args(["cluster", "destroy", "--name", name, "--provisioner", "docker"]);
        cmd.push("--state".to_string());
        cmd.push(Self::path_arg(&dir));

        info!(cluster = name, "destroying talos cluster");
        run_checked(
            self.ctx.runner.as_ref(),
            TALOSCTL,
            &cmd,
            self.ctx.delete_timeout,
        )
        .await?;

        self.remove_local_files(name);
        Ok(())
    }

    async fn get_kubeconfig(&self, name: &str) -> Result<Vec<u8>, ProviderError> {
        validate_cluster_name(name)?;
        self.find(name).await?;

        let dir = self.ctx.cluster_dir(name);
        let kubeconfig = dir.join(KUBECONFIG_FILE_NAME);
        let mut cmd = args(["kubeconfig"]);
        cmd.push(Self::path_arg(&kubeconfig));
        cmd.push("--talosconfig".to_string());
        cmd.push(Self::path_arg(&dir.join(TALOSCONFIG_FILE_NAME)));
        cmd.push("--nodes".to_string());
        cmd.push(TALOS_CONTROL_PLANE_IP.to_string());
        cmd.push("--force".to_string());
        cmd.push("--merge=false".to_string());

        run_checked(
            self.ctx.runner.as_ref(),
            TALOSCTL,
            &cmd,
            self.ctx.query_timeout,
        )
        .await?;

        tokio::fs::read(&kubeconfig).await.map_err(|e| {
            ProviderError::Unknown(format!(
                "talosctl did not produce '{}': {}",
                kubeconfig.display(),
                e
            ))
        })
    }

    async fn get_details(&self, name: &str) -> Result<ClusterDetails, ProviderError> {
        validate_cluster_name(name)?;
        let nodes = self.find(name).await?;

        let mut details = ClusterDetails::new(
            name,
            ProviderKind::Talos,
            ClusterStatus::from_raw(nodes.raw_status()),
        );
        details.node_count = Some(nodes.total);
        Ok(details)
    }
}
