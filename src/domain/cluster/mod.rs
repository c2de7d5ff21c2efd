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

//! Cluster domain: records, persistence, registry and lifecycle

pub mod lifecycle;
pub mod locks;
pub mod record;
pub mod registry;
pub mod store;
pub mod validator;

pub use lifecycle::{K8sDetails, LifecycleManager, RetryPolicy};
pub use locks::NameLocks;
pub use record::{
    ClusterDetails, ClusterRecord, ClusterStatus, ProviderKind, META_KUBERNETES_VERSION,
    META_LAST_ERROR, META_NODE_COUNT,
};
pub use registry::{ClusterRegistry, RefreshReport};
pub use store::RecordStore;
pub use validator::{is_valid_cluster_name, validate_cluster_name};
