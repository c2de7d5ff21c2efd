//! Default provider commands

use super::display::TableRenderer;
use super::AppContext;
use crate::domain::cluster::ProviderKind;
use crate::domain::config::ProviderConfig;
use anyhow::Context;
use clap::{Args, Subcommand};

#[derive(Args, Debug, Clone)]
pub struct ProviderCommand {
    #[command(subcommand)]
    pub action: ProviderAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProviderAction {
    /// List supported providers and mark the current default
    List,

    /// Set the default provider for new clusters
    Set {
        /// One of: talos, kind, k3s, minikube
        name: String,
    },
}

impl ProviderCommand {
    pub async fn execute(&self, ctx: &AppContext) -> anyhow::Result<()> {
        match &self.action {
            ProviderAction::List => {
                let current = ctx
                    .config
                    .load()
                    .context("Failed to load provider configuration")?
                    .provider;
                println!("{}", TableRenderer::new().render_providers(current));
            }
            ProviderAction::Set { name } => {
                let provider: ProviderKind = name.parse()?;
                ctx.config
                    .save(&ProviderConfig::new(provider))
                    .with_context(|| {
                        format!("Failed to write {}", ctx.config.path().display())
                    })?;
                println!("Default provider set to {}", provider);
            }
        }
        Ok(())
    }
}
