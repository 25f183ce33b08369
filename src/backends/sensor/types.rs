// SPDX-License-Identifier: GPL-3.0-only
// Shared types for sensor backend abstraction

//! Shared types for sensor backends

use crate::errors::SensorError;
use image::{ImageBuffer, Luma, RgbaImage};
use serde::{Deserialize, Serialize};

/// Single-channel floating point image (depth in mm, or raw IR intensity)
pub type DepthImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Result type for sensor operations
pub type SensorResult<T> = Result<T, SensorError>;

/// Sensor backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SensorBackendType {
    /// Deterministic generated frames (no hardware required)
    Synthetic,
    /// Kinect via the freedepth userspace driver
    Freedepth,
}

impl Default for SensorBackendType {
    /// The Kinect driver when it is compiled in; generated frames otherwise
    fn default() -> Self {
        if cfg!(all(target_arch = "x86_64", feature = "freedepth")) {
            SensorBackendType::Freedepth
        } else {
            SensorBackendType::Synthetic
        }
    }
}

impl std::fmt::Display for SensorBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorBackendType::Synthetic => write!(f, "synthetic"),
            SensorBackendType::Freedepth => write!(f, "freedepth"),
        }
    }
}

/// Depth packet processing pipeline requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    /// Software decoding
    #[default]
    Cpu,
    /// OpenGL accelerated decoding
    OpenGl,
    /// OpenCL accelerated decoding
    OpenCl,
}

impl PipelineKind {
    /// All pipelines, in command-line token order
    pub const ALL: [PipelineKind; 3] = [
        PipelineKind::Cpu,
        PipelineKind::OpenGl,
        PipelineKind::OpenCl,
    ];

    /// Parse a command-line selector token (`cpu`, `gl`, `cl`)
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "cpu" => Some(PipelineKind::Cpu),
            "gl" => Some(PipelineKind::OpenGl),
            "cl" => Some(PipelineKind::OpenCl),
            _ => None,
        }
    }

    /// The command-line token for this pipeline
    pub fn token(&self) -> &'static str {
        match self {
            PipelineKind::Cpu => "cpu",
            PipelineKind::OpenGl => "gl",
            PipelineKind::OpenCl => "cl",
        }
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineKind::Cpu => write!(f, "CPU"),
            PipelineKind::OpenGl => write!(f, "OpenGL"),
            PipelineKind::OpenCl => write!(f, "OpenCL"),
        }
    }
}

/// A sensor found during enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDeviceInfo {
    /// Serial number (all digits for real devices)
    pub serial: String,
    /// Human readable name
    pub name: String,
    /// Bus location or other backend specific detail
    pub location: Option<String>,
}

/// One synchronized bundle of color, infrared and depth samples
#[derive(Debug, Clone)]
pub struct FrameSet {
    /// Monotonic sequence number assigned by the backend
    pub sequence: u64,
    /// Color frame (RGBA, 8 bits per channel)
    pub color: RgbaImage,
    /// Infrared intensity
    pub ir: DepthImage,
    /// Raw depth in millimetres (0 = no reading)
    pub depth: DepthImage,
}

impl FrameSet {
    /// A frame set holding no pixel data
    pub fn empty() -> Self {
        Self {
            sequence: 0,
            color: RgbaImage::new(0, 0),
            ir: DepthImage::new(0, 0),
            depth: DepthImage::new(0, 0),
        }
    }

    /// True if this set carries no pixel data
    pub fn is_empty(&self) -> bool {
        self.depth.width() == 0 && self.color.width() == 0
    }
}

/// Output of depth-to-color registration
#[derive(Debug, Clone)]
pub struct RegisteredFrames {
    /// Depth with lens distortion removed, in mm, depth sensor resolution
    pub undistorted: DepthImage,
    /// Color sampled at each undistorted depth pixel (transparent where no depth)
    pub registered: RgbaImage,
}
