//! Color theme for CLI output

use crate::domain::cluster::ClusterStatus;
use comfy_table::Color as TableColor;

#[derive(Debug, Clone)]
pub struct ColorTheme {
    pub success: TableColor,
    pub warning: TableColor,
    pub error: TableColor,
    pub info: TableColor,
    pub muted: TableColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: TableColor::Green,
            warning: TableColor::Yellow,
            error: TableColor::Red,
            info: TableColor::Cyan,
            muted: TableColor::DarkGrey,
        }
    }
}

impl ColorTheme {
    pub fn status_color(&self, status: ClusterStatus) -> TableColor {
        match status {
            ClusterStatus::Running => self.success,
            ClusterStatus::Creating | ClusterStatus::Deleting => self.info,
            ClusterStatus::Error => self.error,
            ClusterStatus::Unknown => self.warning,
        }
    }

    /// Color for a ready/desired replica pair
    pub fn replica_color(&self, ready: i32, desired: i32) -> TableColor {
        if desired <= 0 {
            self.muted
        } else if ready >= desired {
            self.success
        } else if ready > 0 {
            self.warning
        } else {
            self.error
        }
    }
}
