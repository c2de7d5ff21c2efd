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

use super::constants::QUERY_TIMEOUT;
use super::process::{args, run_checked, CommandRunner, SystemCommandRunner};
use crate::shared::error::ProviderError;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const HELM: &str = "helm";

/// One row of `helm list -o json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HelmRelease {
    pub name: String,
    pub namespace: String,
    pub revision: String,
    pub updated: String,
    pub status: String,
    pub chart: String,
    pub app_version: String,
}

#[derive(Clone)]
pub struct HelmClient {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl Default for HelmClient {
    fn default() -> Self {
        Self::new(Arc::new(SystemCommandRunner))
    }
}

impl HelmClient {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            timeout: QUERY_TIMEOUT,
        }
    }

    /// Releases in every namespace of the cluster behind `kubeconfig`.
    pub async fn list_releases(&self, kubeconfig: &Path) -> Result<Vec<HelmRelease>, ProviderError> {
        let mut cmd = args(["list", "--all-namespaces", "--output", "json", "--kubeconfig"]);
        cmd.push(kubeconfig.to_string_lossy().into_owned());

        let output = run_checked(self.runner.as_ref(), HELM, &cmd, self.timeout).await?;
        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(stdout)
            .map_err(|e| ProviderError::Unknown(format!("unexpected helm list output: {}", e)))
    }
}
