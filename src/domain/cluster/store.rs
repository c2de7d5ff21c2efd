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

//! Persisted cluster records, one directory per cluster:
//!
//! ```text
//! <home>/clusters/<name>/cluster.yaml
//! <home>/clusters/<name>/provider.txt   (older layout, provider label only)
//! ```

use super::record::{ClusterRecord, ClusterStatus, ProviderKind};
use super::validator::is_valid_cluster_name;
use crate::infrastructure::constants::{
    CLUSTERS_DIR_NAME, LEGACY_PROVIDER_FILE_NAME, RECORD_FILE_NAME,
};
use crate::infrastructure::fs::write_atomic;
use crate::shared::error::StateError;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn at_home(home: &Path) -> Self {
        Self::new(home.join(CLUSTERS_DIR_NAME))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cluster_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Every record on disk. Directories whose names are not valid cluster
    /// names are ignored, as are directories with neither a record nor a
    /// provider label.
    pub fn load_all(&self) -> Result<Vec<ClusterRecord>, StateError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StateError::io(&self.root, e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StateError::io(&self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_valid_cluster_name(&name) {
                debug!(dir = %entry.path().display(), "skipping directory with invalid cluster name");
                continue;
            }
            if let Some(record) = self.load_one(&name)? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    fn load_one(&self, name: &str) -> Result<Option<ClusterRecord>, StateError> {
        let dir = self.cluster_dir(name);

        let record_path = dir.join(RECORD_FILE_NAME);
        match std::fs::read_to_string(&record_path) {
            Ok(content) => match serde_yaml::from_str::<ClusterRecord>(&content) {
                Ok(mut record) => {
                    record.name = name.to_string();
                    return Ok(Some(record));
                }
                Err(e) => {
                    warn!(path = %record_path.display(), error = %e, "unreadable cluster record, treating status as unknown");
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StateError::io(&record_path, e)),
        }

        let legacy_path = dir.join(LEGACY_PROVIDER_FILE_NAME);
        match std::fs::read_to_string(&legacy_path) {
            Ok(label) => {
                let mut record = ClusterRecord::with_status(
                    name,
                    ProviderKind::from_label(&label),
                    ClusterStatus::Unknown,
                );
                if let Ok(modified) = std::fs::metadata(&legacy_path).and_then(|m| m.modified()) {
                    record.created_at = DateTime::<Utc>::from(modified);
                }
                Ok(Some(record))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if record_path.exists() {
                    Ok(Some(ClusterRecord::with_status(
                        name,
                        ProviderKind::Unknown,
                        ClusterStatus::Unknown,
                    )))
                } else {
                    Ok(None)
                }
            }
            Err(e) => Err(StateError::io(&legacy_path, e)),
        }
    }

    pub fn save(&self, record: &ClusterRecord) -> Result<(), StateError> {
        let path = self.cluster_dir(&record.name).join(RECORD_FILE_NAME);
        let yaml = serde_yaml::to_string(record).map_err(|source| StateError::Serialize {
            name: record.name.clone(),
            source,
        })?;
        write_atomic(&path, yaml.as_bytes()).map_err(|e| StateError::io(&path, e))
    }

    /// Forget the record but keep any provider files next to it.
    pub fn remove(&self, name: &str) -> Result<(), StateError> {
        let dir = self.cluster_dir(name);
        for file in [RECORD_FILE_NAME, LEGACY_PROVIDER_FILE_NAME] {
            let path = dir.join(file);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(StateError::io(&path, e)),
            }
        }
        // Only succeeds when nothing else lives there.
        let _ = std::fs::remove_dir(&dir);
        Ok(())
    }

    /// Remove everything stored for a cluster that no longer exists.
    pub fn purge(&self, name: &str) -> Result<(), StateError> {
        let dir = self.cluster_dir(name);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateError::io(&dir, e)),
        }
    }
}
