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

use std::time::Duration;

/// Application paths (relative to the k8slocal home)
pub const HOME_DIR_NAME: &str = ".k8slocal";
pub const HOME_ENV_VAR: &str = "K8SLOCAL_HOME";
pub const CONFIG_FILE_NAME: &str = "config.yaml";
pub const CLUSTERS_DIR_NAME: &str = "clusters";
pub const RECORD_FILE_NAME: &str = "cluster.yaml";
pub const LEGACY_PROVIDER_FILE_NAME: &str = "provider.txt";
pub const KUBECONFIG_FILE_NAME: &str = "kubeconfig";
pub const TALOSCONFIG_FILE_NAME: &str = "talosconfig";
pub const TEMP_FILE_SUFFIX: &str = ".tmp";

/// File permissions
pub const CONFIG_FILE_MODE: u32 = 0o600;
pub const STATE_DIR_MODE: u32 = 0o750;

/// Provider timeouts
pub const DEFAULT_CREATE_WAIT: Duration = Duration::from_secs(300);
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(180);
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(30);
/// Extra time given to a provider CLI beyond its own `--wait` budget.
pub const COMMAND_GRACE: Duration = Duration::from_secs(60);

/// Lifecycle retry settings
pub const MAX_TRANSIENT_RETRIES: usize = 2;
pub const RETRY_MIN_DELAY: Duration = Duration::from_secs(2);
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(15);

/// Readiness probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Talos docker provisioner
pub const TALOS_CONTROL_PLANE_IP: &str = "10.5.0.2";
pub const TALOS_CLUSTER_LABEL: &str = "talos.cluster.name";
pub const TALOS_OWNED_LABEL: &str = "talos.owned=true";

/// Stderr fragments that indicate a connectivity blip rather than a real failure.
pub const TRANSIENT_ERROR_MARKERS: &[&str] = &[
    "connection refused",
    "connection reset",
    "i/o timeout",
    "tls handshake timeout",
    "temporarily unavailable",
    "context deadline exceeded",
    "too many requests",
];
