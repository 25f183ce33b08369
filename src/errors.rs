// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture tool

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Sensor backend errors
    Sensor(SensorError),
    /// Preview/terminal errors
    Preview(String),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Sensor-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// No sensor devices connected
    NoDeviceFound,
    /// The selected device could not be opened
    OpenFailed(String),
    /// Frames requested before `start()`
    NotStarted,
    /// A frame set was requested while the previous one is still held
    FramesNotReleased,
    /// The device stopped delivering frames
    StreamEnded,
    /// Backend error (driver, USB, SDK)
    Backend(String),
}

/// Rectification errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectifyError {
    /// The corners do not define an invertible projective mapping
    DegenerateGeometry,
    /// The derived output would exceed the per-side size limit
    OutputTooLarge { width: u32, height: u32 },
}

/// Output slot errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Output directory could not be created
    CreateDirFailed(String),
    /// PNG encoding or write failed
    WriteFailed(String),
    /// Moving the finished file into its slot failed
    RenameFailed(String),
}

impl AppError {
    /// True for the failures that end the process with exit code -1
    pub fn is_device_unavailable(&self) -> bool {
        matches!(
            self,
            AppError::Sensor(SensorError::NoDeviceFound | SensorError::OpenFailed(_))
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Sensor(e) => write!(f, "Sensor error: {}", e),
            AppError::Preview(msg) => write!(f, "Preview error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::NoDeviceFound => write!(f, "no device connected"),
            SensorError::OpenFailed(msg) => write!(f, "failure opening device: {}", msg),
            SensorError::NotStarted => write!(f, "device has not been started"),
            SensorError::FramesNotReleased => {
                write!(f, "previous frame set has not been released")
            }
            SensorError::StreamEnded => write!(f, "frame stream ended"),
            SensorError::Backend(msg) => write!(f, "backend error: {}", msg),
        }
    }
}

impl fmt::Display for RectifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RectifyError::DegenerateGeometry => {
                write!(f, "corners do not define an invertible perspective mapping")
            }
            RectifyError::OutputTooLarge { width, height } => {
                write!(f, "rectified output {}x{} exceeds size limit", width, height)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::CreateDirFailed(msg) => {
                write!(f, "Failed to create output directory: {}", msg)
            }
            StorageError::WriteFailed(msg) => write!(f, "Write failed: {}", msg),
            StorageError::RenameFailed(msg) => write!(f, "Rename failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for SensorError {}
impl std::error::Error for RectifyError {}
impl std::error::Error for StorageError {}

// Conversions from sub-errors to AppError
impl From<SensorError> for AppError {
    fn from(err: SensorError) -> Self {
        AppError::Sensor(err)
    }
}

// Terminal I/O is the only raw io::Error source outside of storage,
// which maps its own errors explicitly.
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Preview(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_unavailable_covers_missing_and_open_failure() {
        assert!(AppError::from(SensorError::NoDeviceFound).is_device_unavailable());
        assert!(
            AppError::from(SensorError::OpenFailed("busy".into())).is_device_unavailable()
        );
        assert!(!AppError::from(SensorError::StreamEnded).is_device_unavailable());
        assert!(!AppError::Config("bad".into()).is_device_unavailable());
    }

    #[test]
    fn display_includes_context() {
        let err = AppError::from(SensorError::OpenFailed("usb".into()));
        assert_eq!(err.to_string(), "Sensor error: failure opening device: usb");
    }
}
