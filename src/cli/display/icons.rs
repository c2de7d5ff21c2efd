//! Status icons for CLI output

use crate::domain::cluster::ClusterStatus;

pub struct StatusIcon;

impl StatusIcon {
    pub const SUCCESS: &'static str = "✓";

    pub const WARNING: &'static str = "⚠";

    pub const ERROR: &'static str = "✗";

    /// Operation in flight
    pub const PENDING: &'static str = "⏳";

    pub const UNKNOWN: &'static str = "?";

    pub fn for_status(status: ClusterStatus) -> &'static str {
        match status {
            ClusterStatus::Running => Self::SUCCESS,
            ClusterStatus::Creating | ClusterStatus::Deleting => Self::PENDING,
            ClusterStatus::Error => Self::ERROR,
            ClusterStatus::Unknown => Self::UNKNOWN,
        }
    }

    /// Icon for a ready/desired replica pair
    pub fn for_replicas(ready: i32, desired: i32) -> &'static str {
        if desired <= 0 {
            Self::UNKNOWN
        } else if ready >= desired {
            Self::SUCCESS
        } else if ready > 0 {
            Self::WARNING
        } else {
            Self::ERROR
        }
    }
}
