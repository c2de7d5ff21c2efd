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

//! minikube driver; each cluster is a minikube profile.

use super::{CreateOptions, DriverContext, ListedCluster, ProviderDriver};
use crate::domain::cluster::{validate_cluster_name, ClusterDetails, ClusterStatus, ProviderKind};
use crate::infrastructure::constants::COMMAND_GRACE;
use crate::infrastructure::process::{args, classify_failure, run_checked};
use crate::shared::error::ProviderError;
use serde::Deserialize;
use tracing::info;

const MINIKUBE: &str = "minikube";
const KUBECTL: &str = "kubectl";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProfileList {
    valid: Vec<Profile>,
    invalid: Vec<Profile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct Profile {
    name: String,
    status: String,
    config: Option<ProfileConfig>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct ProfileConfig {
    kubernetes_config: Option<KubernetesConfig>,
    nodes: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct KubernetesConfig {
    kubernetes_version: String,
}

/// minikube exits non-zero when no profile exists at all.
fn is_no_profiles(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("no minikube profile") || lowered.contains("profile was found")
}

pub struct MinikubeDriver {
    ctx: DriverContext,
}

impl MinikubeDriver {
    pub fn new(ctx: DriverContext) -> Self {
        Self { ctx }
    }

    async fn profiles(&self) -> Result<Vec<Profile>, ProviderError> {
        let cmd = args(["profile", "list", "-o", "json"]);
        let output = self
            .ctx
            .runner
            .run(MINIKUBE, &cmd, self.ctx.query_timeout)
            .await?;

        if !output.success() {
            if is_no_profiles(&output.combined()) {
                return Ok(Vec::new());
            }
            return Err(classify_failure(MINIKUBE, &cmd, &output));
        }

        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            return Ok(Vec::new());
        }
        let list: ProfileList = serde_json::from_str(stdout).map_err(|e| {
            ProviderError::Unknown(format!("unexpected minikube profile list output: {}", e))
        })?;

        let mut profiles = list.valid;
        profiles.extend(list.invalid.into_iter().map(|mut p| {
            p.status = "misconfigured".to_string();
            p
        }));
        Ok(profiles)
    }

    async fn find(&self, name: &str) -> Result<Profile, ProviderError> {
        self.profiles()
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ProviderError::NotFound(name.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderDriver for MinikubeDriver {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Minikube
    }

    async fn list_clusters(&self) -> Result<Vec<ListedCluster>, ProviderError> {
        Ok(self
            .profiles()
            .await?
            .into_iter()
            .map(|p| (p.name, p.status))
            .collect())
    }

    async fn create_cluster(
        &self,
        name: &str,
        options: &CreateOptions,
    ) -> Result<(), ProviderError> {
        validate_cluster_name(name)?;
        if self.profiles().await?.iter().any(|p| p.name == name) {
            return Err(ProviderError::AlreadyExists(name.to_string()));
        }

        let mut cmd = args(["start", "-p", name, "--wait=all"]);
        cmd.push(format!("--wait-timeout={}s", options.wait.as_secs()));
        if let Some(tag) = options.version_tag() {
            cmd.push(format!("--kubernetes-version={}", tag));
        }
        if let Some(workers) = options.workers.filter(|w| *w > 0) {
            cmd.push(format!("--nodes={}", workers + 1));
        }

        info!(cluster = name, "starting minikube profile");
        run_checked(
            self.ctx.runner.as_ref(),
            MINIKUBE,
            &cmd,
            options.wait + COMMAND_GRACE,
        )
        .await?;
        Ok(())
    }

    async fn delete_cluster(&self, name: &str) -> Result<(), ProviderError> {
        validate_cluster_name(name)?;
        self.find(name).await?;

        info!(cluster = name, "deleting minikube profile");
        run_checked(
            self.ctx.runner.as_ref(),
            MINIKUBE,
            &args(["delete", "-p", name]),
            self.ctx.delete_timeout,
        )
        .await?;
        Ok(())
    }

    async fn get_kubeconfig(&self, name: &str) -> Result<Vec<u8>, ProviderError> {
        validate_cluster_name(name)?;
        self.find(name).await?;

        // minikube names the kubeconfig context after the profile.
        let output = run_checked(
            self.ctx.runner.as_ref(),
            KUBECTL,
            &args([
                "config", "view", "--raw", "--minify", "--flatten", "--context", name,
            ]),
            self.ctx.query_timeout,
        )
        .await?;
        Ok(output.stdout.into_bytes())
    }

    async fn get_details(&self, name: &str) -> Result<ClusterDetails, ProviderError> {
        validate_cluster_name(name)?;
        let profile = self.find(name).await?;

        let mut details = ClusterDetails::new(
            name,
            ProviderKind::Minikube,
            ClusterStatus::from_raw(&profile.status),
        );
        if let Some(config) = profile.config {
            details.node_count = Some(config.nodes.len() as u32);
            details.kubernetes_version = config
                .kubernetes_config
                .map(|k| k.kubernetes_version)
                .filter(|v| !v.is_empty());
        }
        Ok(details)
    }
}
