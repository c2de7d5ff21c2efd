//! Workload and Helm release listing

use super::display::TableRenderer;
use super::{require_valid_name, AppContext};
use anyhow::Context;
use clap::{Args, Subcommand};

#[derive(Args, Debug, Clone)]
pub struct AppsCommand {
    #[command(subcommand)]
    pub action: AppsAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AppsAction {
    /// List Deployments, StatefulSets and DaemonSets in all namespaces
    List {
        /// Cluster name
        cluster: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct HelmCommand {
    #[command(subcommand)]
    pub action: HelmAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum HelmAction {
    /// List Helm releases in all namespaces
    List {
        /// Cluster name
        cluster: String,
    },
}

impl AppsCommand {
    pub async fn execute(&self, ctx: &AppContext) -> anyhow::Result<()> {
        let AppsAction::List { cluster } = &self.action;
        require_valid_name(cluster)?;

        ctx.manager
            .refresh()
            .await
            .context("Failed to refresh cluster list")?;
        let workloads = ctx
            .manager
            .apps(cluster)
            .await
            .with_context(|| format!("Failed to list apps in cluster {}", cluster))?;
        println!("{}", TableRenderer::new().render_workloads(cluster, &workloads));
        Ok(())
    }
}

impl HelmCommand {
    pub async fn execute(&self, ctx: &AppContext) -> anyhow::Result<()> {
        let HelmAction::List { cluster } = &self.action;
        require_valid_name(cluster)?;

        ctx.manager
            .refresh()
            .await
            .context("Failed to refresh cluster list")?;
        let releases = ctx
            .manager
            .helm_releases(cluster)
            .await
            .with_context(|| format!("Failed to list Helm releases in cluster {}", cluster))?;
        println!(
            "{}",
            TableRenderer::new().render_helm_releases(cluster, &releases)
        );
        Ok(())
    }
}
