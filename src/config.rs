// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::sensor::{PipelineKind, SensorBackendType};
use crate::constants::{
    APP_ID, CONFIG_FILE_NAME, CleanupPolicy, DEFAULT_FILE_PREFIX, DEFAULT_SLOT_COUNT,
    DEPTH_RANGE_MM, REFRESH_INTERVAL, THRESHOLD_DISABLED,
};
use crate::errors::{AppError, AppResult};
use crate::pipelines::rectify::CornerFractions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Persistent settings
///
/// Every field has a default, so a partial (or empty) file is valid.
/// Command-line options override whatever is loaded here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sensor backend to use (synthetic or freedepth)
    pub backend: SensorBackendType,
    /// Preferred packet pipeline (`None` = backend default)
    pub pipeline: Option<PipelineKind>,
    /// Initial threshold; negative disables the mask
    pub threshold: f32,
    /// Directory output slots are written to
    pub output_dir: PathBuf,
    /// File name prefix of the output slots
    pub file_prefix: String,
    /// Number of output slots
    pub slot_count: usize,
    /// What happens to old slot files when the index wraps
    pub cleanup: CleanupPolicy,
    /// How long each preview refresh waits for a key, in milliseconds
    pub refresh_interval_ms: u64,
    /// Depth mapped to full white in the grayscale conversion
    pub depth_range_mm: f32,
    /// Rectification corners as fractions of the frame
    pub corner_fractions: Option<[f32; 8]>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: SensorBackendType::default(),
            pipeline: None,
            threshold: THRESHOLD_DISABLED,
            output_dir: PathBuf::from("."),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            slot_count: DEFAULT_SLOT_COUNT,
            cleanup: CleanupPolicy::default(),
            refresh_interval_ms: REFRESH_INTERVAL.as_millis() as u64,
            depth_range_mm: DEPTH_RANGE_MM,
            corner_fractions: None,
        }
    }
}

impl Config {
    /// `<config dir>/depth-rectify/config.json`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_ID).join(CONFIG_FILE_NAME))
    }

    /// Read and parse a config file
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load an explicitly named file, or the default file if it exists
    ///
    /// A missing explicit file is an error; a missing default file yields
    /// the built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> AppResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn corners(&self) -> Option<CornerFractions> {
        self.corner_fractions.map(CornerFractions)
    }
}
