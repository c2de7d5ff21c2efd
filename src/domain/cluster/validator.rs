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

use crate::shared::error::ProviderError;
use regex::Regex;
use std::sync::OnceLock;

/// DNS-label rule shared by every provider driver.
pub const CLUSTER_NAME_PATTERN: &str = r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$";

fn cluster_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CLUSTER_NAME_PATTERN).expect("cluster name pattern compiles"))
}

/// Reject names that are not DNS labels.
///
/// A name that passes is also safe to use as a single path component, so the
/// state directory layout can rely on it.
pub fn validate_cluster_name(name: &str) -> Result<(), ProviderError> {
    if cluster_name_regex().is_match(name) {
        Ok(())
    } else {
        Err(ProviderError::InvalidName(name.to_string()))
    }
}

pub fn is_valid_cluster_name(name: &str) -> bool {
    validate_cluster_name(name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["a", "dev", "test-1", "k8s-local-01", "0abc9"] {
            assert!(is_valid_cluster_name(name), "{} should be valid", name);
        }
        assert!(is_valid_cluster_name(&"a".repeat(63)));
    }

    #[test]
    fn test_invalid_names() {
        for name in [
            "",
            "Invalid_Name!",
            "-dev",
            "dev-",
            "Dev",
            "dev.local",
            "..",
            "../etc",
            "dev/cluster",
            "dev cluster",
        ] {
            assert_eq!(
                validate_cluster_name(name),
                Err(ProviderError::InvalidName(name.to_string())),
                "{:?} should be rejected",
                name
            );
        }
        assert!(!is_valid_cluster_name(&"a".repeat(64)));
    }
}
