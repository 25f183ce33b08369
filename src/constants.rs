// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application identifier (config directory name, terminal title)
pub const APP_ID: &str = "depth-rectify";

/// Config file name inside the application config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

// ===== Sensor geometry =====

/// Width of the IR/depth sensor frames (and of undistorted/registered output)
pub const DEPTH_FRAME_WIDTH: u32 = 512;

/// Height of the IR/depth sensor frames
pub const DEPTH_FRAME_HEIGHT: u32 = 424;

/// Width of the color sensor frames
pub const COLOR_FRAME_WIDTH: u32 = 1920;

/// Height of the color sensor frames
pub const COLOR_FRAME_HEIGHT: u32 = 1080;

/// Depth (mm) that maps to full white in the grayscale conversion
pub const DEPTH_RANGE_MM: f32 = 4500.0;

// ===== Threshold =====

/// Threshold value meaning "pass the grayscale image through unchanged"
pub const THRESHOLD_DISABLED: f32 = -1.0;

/// Amount one keypress adds to or removes from the threshold
pub const THRESHOLD_STEP: f32 = 1.0;

/// Mask value for pixels above the threshold
pub const MASK_ON: u8 = 255;

/// Mask value for pixels at or below the threshold
pub const MASK_OFF: u8 = 0;

// ===== Output =====

/// File name prefix for saved frames
pub const DEFAULT_FILE_PREFIX: &str = "test_";

/// Number of rotating output slots (`test_0.png` .. `test_10.png`)
pub const DEFAULT_SLOT_COUNT: usize = 11;

/// How long the preview refresh blocks waiting for a key
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(1000);

/// Preview window showing the raw color frame
pub const WINDOW_RGB: &str = "rgb";

/// Preview window showing the final (thresholded, rectified) output
pub const WINDOW_OUTPUT: &str = "output";

// ===== Rectification =====

/// Largest output side the rectifier will allocate
pub const MAX_RECTIFIED_SIDE: u32 = 16_384;

/// What happens to old output files when the slot index wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPolicy {
    /// Slots are replaced in rotation, nothing is deleted (default)
    #[default]
    Overwrite,
    /// All slot files are deleted each time the index wraps
    Sweep,
}

impl CleanupPolicy {
    /// All policies, in documentation order
    pub const ALL: [CleanupPolicy; 2] = [CleanupPolicy::Overwrite, CleanupPolicy::Sweep];

    /// Get display name for the policy
    pub fn display_name(&self) -> &'static str {
        match self {
            CleanupPolicy::Overwrite => "Overwrite",
            CleanupPolicy::Sweep => "Sweep",
        }
    }

    /// Whether wrapping the slot index deletes the existing files first
    pub fn deletes_on_wrap(&self) -> bool {
        matches!(self, CleanupPolicy::Sweep)
    }
}

impl std::fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
