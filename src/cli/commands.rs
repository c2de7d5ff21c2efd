// CLI command definitions

use super::apps::{AppsCommand, HelmCommand};
use super::cluster::ClusterCommand;
use super::provider::ProviderCommand;
use super::AppContext;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "k8slocal",
    version,
    about = "Manage local Kubernetes clusters",
    long_about = "Create, inspect and delete local Kubernetes clusters backed by Talos, Kind, k3s (k3d) or minikube"
)]
pub struct CliArgs {
    /// State directory (defaults to ~/.k8slocal)
    #[arg(long, global = true, env = "K8SLOCAL_HOME", value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Create, list, inspect and delete clusters
    Cluster(ClusterCommand),

    /// Show or change the default provider
    Provider(ProviderCommand),

    /// Inspect workloads running in a cluster
    Apps(AppsCommand),

    /// Inspect Helm releases installed in a cluster
    Helm(HelmCommand),
}

impl Commands {
    pub async fn execute(&self, ctx: &AppContext) -> anyhow::Result<()> {
        match self {
            Commands::Cluster(cmd) => cmd.execute(ctx).await,
            Commands::Provider(cmd) => cmd.execute(ctx).await,
            Commands::Apps(cmd) => cmd.execute(ctx).await,
            Commands::Helm(cmd) => cmd.execute(ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::cluster::ClusterAction;
    use crate::domain::cluster::ProviderKind;

    #[test]
    fn test_parse_create_with_flags() {
        let args = CliArgs::try_parse_from([
            "k8slocal",
            "-vv",
            "cluster",
            "create",
            "dev",
            "--provider",
            "kind",
            "--workers",
            "2",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);

        let Commands::Cluster(cmd) = args.command else {
            panic!("expected cluster command");
        };
        let ClusterAction::Create(create) = cmd.action else {
            panic!("expected create");
        };
        assert_eq!(create.name, "dev");
        assert_eq!(create.provider, Some(ProviderKind::Kind));
        assert_eq!(create.workers, Some(2));
        assert_eq!(create.timeout, 300);
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let result = CliArgs::try_parse_from([
            "k8slocal", "cluster", "create", "dev", "--provider", "docker",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_k8sdetails_subcommand_name() {
        let args = CliArgs::try_parse_from(["k8slocal", "cluster", "k8sdetails", "dev"]).unwrap();
        let Commands::Cluster(cmd) = args.command else {
            panic!("expected cluster command");
        };
        assert!(matches!(cmd.action, ClusterAction::K8sdetails(_)));
    }

    #[test]
    fn test_global_home_after_subcommand() {
        let args =
            CliArgs::try_parse_from(["k8slocal", "provider", "list", "--home", "/tmp/k8s"]).unwrap();
        assert_eq!(args.home, Some(PathBuf::from("/tmp/k8s")));
    }
}
