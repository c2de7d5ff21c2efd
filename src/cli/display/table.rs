//! Table rendering for CLI output

use super::{ColorTheme, StatusIcon};
use crate::domain::cluster::{
    ClusterDetails, ClusterRecord, K8sDetails, ProviderKind, META_KUBERNETES_VERSION,
    META_NODE_COUNT,
};
use crate::infrastructure::helm::HelmRelease;
use crate::infrastructure::kubernetes::WorkloadSummary;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Color, ContentArrangement, Table};

/// Table renderer for formatted output
pub struct TableRenderer {
    theme: ColorTheme,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRenderer {
    pub fn new() -> Self {
        Self {
            theme: ColorTheme::default(),
        }
    }

    fn table(headers: &[&str]) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(
                headers
                    .iter()
                    .map(|h| Cell::new(h).set_alignment(CellAlignment::Left))
                    .collect::<Vec<_>>(),
            );
        table
    }

    fn titled(title: &str, count: usize, noun: &str, table: &Table) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "╭─ {} {} ─╮\n",
            title,
            format!("[{} {}]", count, noun).bright_black()
        ));
        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    pub fn render_clusters(&self, clusters: &[ClusterRecord]) -> String {
        if clusters.is_empty() {
            return "No clusters found".to_string();
        }

        let mut table = Self::table(&["NAME", "PROVIDER", "STATUS", "NODES", "VERSION", "CREATED"]);
        for cluster in clusters {
            let metadata = |key: &str| {
                cluster
                    .provider_metadata
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| "-".to_string())
            };
            table.add_row(vec![
                Cell::new(&cluster.name),
                Cell::new(cluster.provider),
                Cell::new(format!(
                    "{} {}",
                    StatusIcon::for_status(cluster.status),
                    cluster.status
                ))
                .fg(self.theme.status_color(cluster.status)),
                Cell::new(metadata(META_NODE_COUNT)).set_alignment(CellAlignment::Center),
                Cell::new(metadata(META_KUBERNETES_VERSION)),
                Cell::new(cluster.created_at.format("%Y-%m-%d %H:%M:%S UTC")).fg(self.theme.muted),
            ]);
        }

        let mut output = Self::titled("Clusters", clusters.len(), "clusters", &table);
        output.push_str(&format!(
            "Legend: {} Running  {} In progress  {} Error  {} Unknown\n",
            StatusIcon::SUCCESS.green(),
            StatusIcon::PENDING.cyan(),
            StatusIcon::ERROR.red(),
            StatusIcon::UNKNOWN.yellow()
        ));
        output
    }

    pub fn render_details(&self, details: &ClusterDetails) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.add_row(vec![Cell::new("Cluster"), Cell::new(&details.name)]);
        table.add_row(vec![Cell::new("Provider"), Cell::new(details.provider)]);
        table.add_row(vec![
            Cell::new("Status"),
            Cell::new(format!(
                "{} {}",
                StatusIcon::for_status(details.status),
                details.status
            ))
            .fg(self.theme.status_color(details.status)),
        ]);
        table.add_row(vec![
            Cell::new("Nodes"),
            Cell::new(
                details
                    .node_count
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
        table.add_row(vec![
            Cell::new("Kubernetes"),
            Cell::new(details.kubernetes_version.as_deref().unwrap_or("-")),
        ]);
        table.to_string()
    }

    pub fn render_k8s_details(&self, details: &K8sDetails) -> String {
        let mut output = format!(
            "Cluster: {} | Provider: {} | API server: {}\n",
            details.name, details.provider, details.server_version
        );

        let mut table = Self::table(&["NODE", "STATUS", "ROLES", "VERSION"]);
        for node in &details.nodes {
            let (status, color) = if node.ready {
                (format!("{} Ready", StatusIcon::SUCCESS), self.theme.success)
            } else {
                (format!("{} NotReady", StatusIcon::ERROR), self.theme.error)
            };
            let roles = if node.roles.is_empty() {
                "<none>".to_string()
            } else {
                node.roles.join(",")
            };
            table.add_row(vec![
                Cell::new(&node.name),
                Cell::new(status).fg(color),
                Cell::new(roles),
                Cell::new(node.kubelet_version.as_deref().unwrap_or("-")),
            ]);
        }
        output.push_str(&table.to_string());
        output
    }

    pub fn render_workloads(&self, cluster: &str, workloads: &[WorkloadSummary]) -> String {
        if workloads.is_empty() {
            return format!("No workloads found in cluster {}", cluster);
        }

        let mut table = Self::table(&["NAMESPACE", "KIND", "NAME", "READY"]);
        for workload in workloads {
            table.add_row(vec![
                Cell::new(&workload.namespace),
                Cell::new(workload.kind),
                Cell::new(&workload.name),
                Cell::new(format!(
                    "{} {}/{}",
                    StatusIcon::for_replicas(workload.ready, workload.desired),
                    workload.ready,
                    workload.desired
                ))
                .fg(self.theme.replica_color(workload.ready, workload.desired))
                .set_alignment(CellAlignment::Center),
            ]);
        }
        Self::titled(
            &format!("Apps in {}", cluster),
            workloads.len(),
            "workloads",
            &table,
        )
    }

    pub fn render_helm_releases(&self, cluster: &str, releases: &[HelmRelease]) -> String {
        if releases.is_empty() {
            return format!("No Helm releases found in cluster {}", cluster);
        }

        let mut table = Self::table(&[
            "NAME",
            "NAMESPACE",
            "REVISION",
            "STATUS",
            "CHART",
            "APP VERSION",
        ]);
        for release in releases {
            let color = if release.status == "deployed" {
                self.theme.success
            } else if release.status.starts_with("pending") {
                self.theme.info
            } else {
                self.theme.error
            };
            table.add_row(vec![
                Cell::new(&release.name),
                Cell::new(&release.namespace),
                Cell::new(&release.revision).set_alignment(CellAlignment::Center),
                Cell::new(&release.status).fg(color),
                Cell::new(&release.chart),
                Cell::new(&release.app_version),
            ]);
        }
        Self::titled(
            &format!("Helm releases in {}", cluster),
            releases.len(),
            "releases",
            &table,
        )
    }

    /// `current` is highlighted.
    pub fn render_providers(&self, current: ProviderKind) -> String {
        let mut table = Self::table(&["PROVIDER", "TOOL", "DEFAULT"]);
        for kind in ProviderKind::SUPPORTED {
            let is_current = kind == current;
            let name = Cell::new(kind);
            table.add_row(vec![
                if is_current { name.fg(Color::Green) } else { name },
                Cell::new(provider_tool(kind)).fg(self.theme.muted),
                Cell::new(if is_current { StatusIcon::SUCCESS } else { "" })
                    .set_alignment(CellAlignment::Center),
            ]);
        }
        table.to_string()
    }
}

/// CLI a provider is driven through.
pub fn provider_tool(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Talos => "talosctl",
        ProviderKind::Kind => "kind",
        ProviderKind::K3s => "k3d",
        ProviderKind::Minikube => "minikube",
        ProviderKind::Unknown => "-",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cluster::ClusterStatus;
    use crate::infrastructure::kubernetes::WorkloadKind;

    #[test]
    fn test_render_empty_clusters() {
        let renderer = TableRenderer::new();
        assert!(renderer.render_clusters(&[]).contains("No clusters found"));
    }

    #[test]
    fn test_render_clusters() {
        let renderer = TableRenderer::new();
        let mut record = ClusterRecord::with_status("dev", ProviderKind::Kind, ClusterStatus::Running);
        record.set_metadata(META_NODE_COUNT, "3");
        record.set_metadata(META_KUBERNETES_VERSION, "v1.30.0");

        let output = renderer.render_clusters(&[record]);
        assert!(output.contains("dev"));
        assert!(output.contains("kind"));
        assert!(output.contains("running"));
        assert!(output.contains("v1.30.0"));
    }

    #[test]
    fn test_render_workloads() {
        let renderer = TableRenderer::new();
        let workloads = vec![WorkloadSummary {
            kind: WorkloadKind::Deployment,
            namespace: "kube-system".to_string(),
            name: "coredns".to_string(),
            ready: 1,
            desired: 2,
        }];
        let output = renderer.render_workloads("dev", &workloads);
        assert!(output.contains("coredns"));
        assert!(output.contains("1/2"));
    }

    #[test]
    fn test_render_providers_marks_current() {
        let renderer = TableRenderer::new();
        let output = renderer.render_providers(ProviderKind::K3s);
        assert!(output.contains("k3d"));
        assert!(output.contains("minikube"));
        assert!(output.contains(StatusIcon::SUCCESS));
    }
}
