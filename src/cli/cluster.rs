//! Cluster lifecycle commands

use super::display::TableRenderer;
use super::{require_valid_name, AppContext};
use crate::domain::cluster::ProviderKind;
use crate::infrastructure::fs::write_atomic;
use crate::infrastructure::provider::CreateOptions;
use anyhow::Context;
use clap::{Args, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args, Debug, Clone)]
pub struct ClusterCommand {
    #[command(subcommand)]
    pub action: ClusterAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ClusterAction {
    /// List all clusters known to k8slocal
    List,

    /// Create a new cluster
    Create(CreateCommand),

    /// Delete a cluster
    Delete(NameArg),

    /// Show provider-reported details of a cluster
    Details(NameArg),

    /// Show API server version and nodes of a cluster
    #[command(name = "k8sdetails")]
    K8sdetails(NameArg),

    /// Print or save the kubeconfig of a cluster
    Kubeconfig(KubeconfigCommand),
}

#[derive(Args, Debug, Clone)]
pub struct NameArg {
    /// Cluster name (lowercase DNS label)
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct CreateCommand {
    /// Cluster name (lowercase DNS label)
    pub name: String,

    /// Provider to create the cluster with
    /// If not specified, uses the provider from the config file
    #[arg(long, short = 'p')]
    pub provider: Option<ProviderKind>,

    /// Kubernetes version (e.g. 1.30.0)
    #[arg(long)]
    pub kubernetes_version: Option<String>,

    /// Number of worker nodes
    #[arg(long)]
    pub workers: Option<u32>,

    /// Seconds to wait for the cluster to become ready
    #[arg(long, default_value = "300")]
    pub timeout: u64,
}

#[derive(Args, Debug, Clone)]
pub struct KubeconfigCommand {
    /// Cluster name (lowercase DNS label)
    pub name: String,

    /// Write the kubeconfig to this file instead of stdout
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

impl ClusterCommand {
    pub async fn execute(&self, ctx: &AppContext) -> anyhow::Result<()> {
        let renderer = TableRenderer::new();
        let manager = &ctx.manager;

        match &self.action {
            ClusterAction::List => {
                let clusters = manager
                    .refresh()
                    .await
                    .context("Failed to refresh cluster list")?;
                println!("{}", renderer.render_clusters(&clusters));
            }
            ClusterAction::Create(cmd) => {
                require_valid_name(&cmd.name)?;
                let provider = match cmd.provider {
                    Some(provider) => provider,
                    None => ctx
                        .config
                        .load()
                        .context("Failed to load provider configuration")?
                        .provider,
                };
                manager
                    .refresh()
                    .await
                    .context("Failed to refresh cluster list")?;

                println!("Creating cluster {} with {}...", cmd.name, provider);
                let record = manager
                    .create(&cmd.name, provider, &cmd.options(), &ctx.cancel)
                    .await
                    .with_context(|| format!("Failed to create cluster {}", cmd.name))?;
                println!(
                    "Cluster {} created successfully with {}!",
                    record.name, record.provider
                );
            }
            ClusterAction::Delete(arg) => {
                require_valid_name(&arg.name)?;
                manager
                    .refresh()
                    .await
                    .context("Failed to refresh cluster list")?;
                manager
                    .delete(&arg.name, &ctx.cancel)
                    .await
                    .with_context(|| format!("Failed to delete cluster {}", arg.name))?;
                println!("Cluster {} deleted successfully!", arg.name);
            }
            ClusterAction::Details(arg) => {
                require_valid_name(&arg.name)?;
                manager
                    .refresh()
                    .await
                    .context("Failed to refresh cluster list")?;
                let details = manager
                    .details(&arg.name)
                    .await
                    .with_context(|| format!("Failed to get details of cluster {}", arg.name))?;
                println!("{}", renderer.render_details(&details));
            }
            ClusterAction::K8sdetails(arg) => {
                require_valid_name(&arg.name)?;
                manager
                    .refresh()
                    .await
                    .context("Failed to refresh cluster list")?;
                let details = manager.k8s_details(&arg.name).await.with_context(|| {
                    format!("Failed to query Kubernetes API of cluster {}", arg.name)
                })?;
                println!("{}", renderer.render_k8s_details(&details));
            }
            ClusterAction::Kubeconfig(cmd) => {
                require_valid_name(&cmd.name)?;
                manager
                    .refresh()
                    .await
                    .context("Failed to refresh cluster list")?;
                let kubeconfig = manager
                    .kubeconfig(&cmd.name)
                    .await
                    .with_context(|| format!("Failed to get kubeconfig of cluster {}", cmd.name))?;
                match &cmd.output {
                    Some(path) => {
                        write_atomic(path, &kubeconfig).with_context(|| {
                            format!("Failed to write kubeconfig to {}", path.display())
                        })?;
                        println!("Kubeconfig for {} written to {}", cmd.name, path.display());
                    }
                    None => {
                        std::io::stdout()
                            .write_all(&kubeconfig)
                            .context("Failed to write kubeconfig to stdout")?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl CreateCommand {
    pub fn options(&self) -> CreateOptions {
        CreateOptions {
            kubernetes_version: self.kubernetes_version.clone(),
            workers: self.workers,
            wait: Duration::from_secs(self.timeout),
        }
    }
}
