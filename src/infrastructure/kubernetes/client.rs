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

use crate::shared::error::KubeError;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client};
use std::fmt;

const ROLE_LABEL_PREFIX: &str = "node-role.kubernetes.io/";

/// One node as shown by `cluster k8sdetails`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    pub name: String,
    pub ready: bool,
    pub roles: Vec<String>,
    pub kubelet_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::DaemonSet => "DaemonSet",
        };
        f.write_str(s)
    }
}

/// A workload controller and its replica readiness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSummary {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
    pub ready: i32,
    pub desired: i32,
}

/// Read-only client for one managed cluster, built from the kubeconfig its
/// provider hands out rather than from the user's default context.
pub struct ClusterKubeClient {
    client: Client,
}

impl ClusterKubeClient {
    pub async fn from_kubeconfig(kubeconfig: &[u8]) -> Result<Self, KubeError> {
        let text = std::str::from_utf8(kubeconfig)
            .map_err(|e| KubeError::Kubeconfig(format!("not valid UTF-8: {}", e)))?;
        let kubeconfig = Kubeconfig::from_yaml(text)?;

        let config =
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await?;

        let client = Client::try_from(config)?;
        Ok(Self { client })
    }

    pub fn get_client(&self) -> Client {
        self.client.clone()
    }

    pub async fn server_version(&self) -> Result<String, KubeError> {
        let info = self.client.apiserver_version().await?;
        Ok(info.git_version)
    }

    pub async fn nodes(&self) -> Result<Vec<NodeSummary>, KubeError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api.list(&ListParams::default()).await?;
        Ok(nodes.items.iter().map(node_summary).collect())
    }

    /// Deployments, StatefulSets and DaemonSets across all namespaces.
    pub async fn workloads(&self) -> Result<Vec<WorkloadSummary>, KubeError> {
        let lp = ListParams::default();

        let deployments: Api<Deployment> = Api::all(self.client.clone());
        let statefulsets: Api<StatefulSet> = Api::all(self.client.clone());
        let daemonsets: Api<DaemonSet> = Api::all(self.client.clone());

        let (deployments, statefulsets, daemonsets) = tokio::try_join!(
            deployments.list(&lp),
            statefulsets.list(&lp),
            daemonsets.list(&lp)
        )?;

        let mut workloads: Vec<WorkloadSummary> = deployments
            .items
            .iter()
            .map(deployment_summary)
            .chain(statefulsets.items.iter().map(statefulset_summary))
            .chain(daemonsets.items.iter().map(daemonset_summary))
            .collect();
        workloads.sort_by(|a, b| {
            (&a.namespace, a.kind, &a.name).cmp(&(&b.namespace, b.kind, &b.name))
        });
        Ok(workloads)
    }
}

pub(crate) fn node_summary(node: &Node) -> NodeSummary {
    let name = node.metadata.name.clone().unwrap_or_default();

    let mut roles: Vec<String> = node
        .metadata
        .labels
        .iter()
        .flatten()
        .filter_map(|(key, _)| key.strip_prefix(ROLE_LABEL_PREFIX))
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect();
    roles.sort();

    let status = node.status.as_ref();
    let ready = status
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false);
    let kubelet_version = status
        .and_then(|s| s.node_info.as_ref())
        .map(|info| info.kubelet_version.clone());

    NodeSummary {
        name,
        ready,
        roles,
        kubelet_version,
    }
}

fn workload(
    kind: WorkloadKind,
    metadata: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta,
    ready: Option<i32>,
    desired: Option<i32>,
) -> WorkloadSummary {
    WorkloadSummary {
        kind,
        namespace: metadata.namespace.clone().unwrap_or_default(),
        name: metadata.name.clone().unwrap_or_default(),
        ready: ready.unwrap_or(0),
        desired: desired.unwrap_or(0),
    }
}

pub(crate) fn deployment_summary(d: &Deployment) -> WorkloadSummary {
    workload(
        WorkloadKind::Deployment,
        &d.metadata,
        d.status.as_ref().and_then(|s| s.ready_replicas),
        // An unset replica count means the API server default of one.
        Some(d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1)),
    )
}

pub(crate) fn statefulset_summary(s: &StatefulSet) -> WorkloadSummary {
    workload(
        WorkloadKind::StatefulSet,
        &s.metadata,
        s.status.as_ref().and_then(|st| st.ready_replicas),
        Some(s.spec.as_ref().and_then(|sp| sp.replicas).unwrap_or(1)),
    )
}

pub(crate) fn daemonset_summary(d: &DaemonSet) -> WorkloadSummary {
    let status = d.status.as_ref();
    workload(
        WorkloadKind::DaemonSet,
        &d.metadata,
        status.map(|s| s.number_ready),
        status.map(|s| s.desired_number_scheduled),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_summary_reads_roles_and_readiness() {
        let node: Node = serde_json::from_value(json!({
            "metadata": {
                "name": "dev-control-plane",
                "labels": {
                    "kubernetes.io/hostname": "dev-control-plane",
                    "node-role.kubernetes.io/control-plane": ""
                }
            },
            "status": {
                "conditions": [
                    {"type": "MemoryPressure", "status": "False"},
                    {"type": "Ready", "status": "True"}
                ],
                "nodeInfo": {
                    "architecture": "amd64",
                    "bootID": "",
                    "containerRuntimeVersion": "containerd://1.7.1",
                    "kernelVersion": "6.1.0",
                    "kubeProxyVersion": "v1.30.0",
                    "kubeletVersion": "v1.30.0",
                    "machineID": "",
                    "operatingSystem": "linux",
                    "osImage": "Debian",
                    "systemUUID": ""
                }
            }
        }))
        .unwrap();

        let summary = node_summary(&node);
        assert_eq!(summary.name, "dev-control-plane");
        assert!(summary.ready);
        assert_eq!(summary.roles, vec!["control-plane".to_string()]);
        assert_eq!(summary.kubelet_version.as_deref(), Some("v1.30.0"));
    }

    #[test]
    fn test_node_without_status_is_not_ready() {
        let node: Node = serde_json::from_value(json!({"metadata": {"name": "w1"}})).unwrap();
        let summary = node_summary(&node);
        assert!(!summary.ready);
        assert!(summary.roles.is_empty());
    }

    #[test]
    fn test_workload_summaries() {
        let deployment: Deployment = serde_json::from_value(json!({
            "metadata": {"name": "coredns", "namespace": "kube-system"},
            "spec": {
                "replicas": 2,
                "selector": {},
                "template": {}
            },
            "status": {"readyReplicas": 1}
        }))
        .unwrap();
        let summary = deployment_summary(&deployment);
        assert_eq!(summary.kind, WorkloadKind::Deployment);
        assert_eq!(summary.namespace, "kube-system");
        assert_eq!((summary.ready, summary.desired), (1, 2));

        let daemonset: DaemonSet = serde_json::from_value(json!({
            "metadata": {"name": "kube-proxy", "namespace": "kube-system"},
            "status": {
                "currentNumberScheduled": 3,
                "desiredNumberScheduled": 3,
                "numberMisscheduled": 0,
                "numberReady": 3
            }
        }))
        .unwrap();
        let summary = daemonset_summary(&daemonset);
        assert_eq!((summary.ready, summary.desired), (3, 3));
    }

    #[tokio::test]
    async fn test_garbage_kubeconfig_is_rejected() {
        let result = ClusterKubeClient::from_kubeconfig(b"clusters: [unterminated").await;
        assert!(matches!(result, Err(KubeError::Kubeconfig(_))));
    }
}
