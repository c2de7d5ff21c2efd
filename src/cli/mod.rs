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

//! Command-line interface

pub mod apps;
pub mod cluster;
pub mod commands;
pub mod display;
pub mod provider;

pub use commands::{CliArgs, Commands};

use crate::domain::cluster::{validate_cluster_name, LifecycleManager, RecordStore};
use crate::domain::config::ConfigStore;
use crate::infrastructure::fs::resolve_home;
use crate::infrastructure::kubernetes::ApiServerProbe;
use crate::infrastructure::provider::ProviderDrivers;
use crate::shared::error::ConfigError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Everything a command needs, wired against the real provider tooling.
pub struct AppContext {
    pub home: PathBuf,
    pub config: ConfigStore,
    pub manager: LifecycleManager,
    pub cancel: CancellationToken,
}

impl AppContext {
    pub fn open(home: Option<&Path>, cancel: CancellationToken) -> anyhow::Result<Self> {
        let home = resolve_home(home).ok_or(ConfigError::NoHomeDir)?;
        debug!(home = %home.display(), "using k8slocal home");

        let store = RecordStore::at_home(&home);
        let drivers = ProviderDrivers::system(store.root());
        let manager = LifecycleManager::new(drivers, store, Arc::new(ApiServerProbe::default()))?;

        Ok(Self::new(home, manager, cancel))
    }

    pub fn new(home: PathBuf, manager: LifecycleManager, cancel: CancellationToken) -> Self {
        Self {
            config: ConfigStore::at_home(&home),
            home,
            manager,
            cancel,
        }
    }
}

/// Reject a bad cluster name before any provider tooling is asked about it.
pub fn require_valid_name(name: &str) -> anyhow::Result<()> {
    validate_cluster_name(name)?;
    Ok(())
}
