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

use crate::domain::cluster::ProviderKind;
use crate::infrastructure::constants::CONFIG_FILE_NAME;
use crate::infrastructure::fs::write_atomic;
use crate::shared::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// User-level settings persisted in `config.yaml`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Provider used when `cluster create` is not given one.
    pub provider: ProviderKind,
}

impl ProviderConfig {
    pub fn new(provider: ProviderKind) -> Self {
        Self { provider }
    }
}

/// On-disk shape. The field is optional so that an empty document or an
/// empty value falls back to the default provider.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    provider: Option<String>,
}

/// Loads and saves [`ProviderConfig`], caching the last value seen.
///
/// A missing file is never an error: it is (re)created with the defaults.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    cached: Mutex<Option<ProviderConfig>>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(None),
        }
    }

    /// The store for a k8slocal home directory.
    pub fn at_home(home: &Path) -> Self {
        Self::new(home.join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ProviderConfig, ConfigError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.path.exists() {
            let config = ProviderConfig::default();
            info!(path = %self.path.display(), provider = %config.provider, "creating default config");
            self.write(&config)?;
            *cached = Some(config);
            return Ok(config);
        }

        if let Some(config) = *cached {
            return Ok(config);
        }

        let config = self.read()?;
        *cached = Some(config);
        Ok(config)
    }

    pub fn save(&self, config: &ProviderConfig) -> Result<(), ConfigError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        self.write(config)?;
        *cached = Some(*config);
        debug!(path = %self.path.display(), provider = %config.provider, "config saved");
        Ok(())
    }

    /// Drop the cached value so the next `load` reads the file again.
    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn read(&self) -> Result<ProviderConfig, ConfigError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| ConfigError::io(&self.path, e))?;
        if content.trim().is_empty() {
            return Ok(ProviderConfig::default());
        }

        let file: ConfigFile =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;

        match file.provider.as_deref().map(str::trim) {
            None | Some("") => Ok(ProviderConfig::default()),
            Some(name) => Ok(ProviderConfig::new(name.parse()?)),
        }
    }

    fn write(&self, config: &ProviderConfig) -> Result<(), ConfigError> {
        let file = ConfigFile {
            provider: Some(config.provider.as_str().to_string()),
        };
        let yaml = serde_yaml::to_string(&file).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, yaml.as_bytes()).map_err(|e| ConfigError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_absent_file_defaults_to_talos_and_is_created() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::at_home(dir.path());

        let config = store.load().unwrap();
        assert_eq!(config.provider, ProviderKind::Talos);
        assert!(store.path().exists());
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.trim(), "provider: talos");
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::at_home(dir.path());

        store.save(&ProviderConfig::new(ProviderKind::Kind)).unwrap();
        assert_eq!(store.load().unwrap().provider, ProviderKind::Kind);

        // A fresh store must see the same value on disk.
        let reopened = ConfigStore::at_home(dir.path());
        assert_eq!(reopened.load().unwrap().provider, ProviderKind::Kind);
    }

    #[test]
    fn test_external_delete_recreates_default() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::at_home(dir.path());
        store
            .save(&ProviderConfig::new(ProviderKind::Minikube))
            .unwrap();

        std::fs::remove_file(store.path()).unwrap();
        assert_eq!(store.load().unwrap().provider, ProviderKind::Talos);
        assert!(store.path().exists());
    }

    #[test]
    fn test_empty_field_uses_default() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::at_home(dir.path());
        std::fs::write(store.path(), "provider: ''\n").unwrap();
        assert_eq!(store.load().unwrap().provider, ProviderKind::Talos);
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::at_home(dir.path());
        std::fs::write(store.path(), "provider: [kind\n").unwrap();
        assert!(matches!(store.load(), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_unknown_provider_in_file() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::at_home(dir.path());
        std::fs::write(store.path(), "provider: docker-desktop\n").unwrap();
        assert!(matches!(
            store.load(),
            Err(ConfigError::UnknownProvider(name)) if name == "docker-desktop"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_config_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = ConfigStore::at_home(dir.path());
        store.load().unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_invalidate_rereads_file() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::at_home(dir.path());
        store.load().unwrap();

        std::fs::write(store.path(), "provider: k3s\n").unwrap();
        assert_eq!(store.load().unwrap().provider, ProviderKind::Talos);
        store.invalidate();
        assert_eq!(store.load().unwrap().provider, ProviderKind::K3s);
    }
}
