// SPDX-License-Identifier: MPL-2.0

//! Depth sensor backend abstraction
//!
//! Device enumeration, frame synchronization and registration belong to the
//! sensor SDK. This module is the seam the capture loop talks to.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │    Capture Loop     │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ SensorBackend Trait │  ← Enumeration, open
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ SensorDevice Trait  │  ← start/stop/close, frame sets, registration
//! └──────────┬──────────┘
//!            │
//!       ┌────┴──────┐
//!       ▼           ▼
//!  ┌─────────┐ ┌──────────┐
//!  │Synthetic│ │freedepth │
//!  └─────────┘ └──────────┘
//! ```
//!
//! Frame buffers belong to the backend and are recycled. Every frame set
//! obtained through [`AcquiredFrames`] is handed back exactly once when the
//! guard is dropped, whichever way the holder leaves its scope.

#[cfg(all(target_arch = "x86_64", feature = "freedepth"))]
pub mod freedepth;
pub mod synthetic;
pub mod types;

pub use types::*;

use image::RgbaImage;
use std::ops::Deref;

/// Blocking source of synchronized frame sets
pub trait FrameSource {
    /// Block until the next synchronized frame set is available
    ///
    /// There is no timeout: an unresponsive device blocks indefinitely.
    fn wait_for_new_frame(&mut self) -> SensorResult<FrameSet>;

    /// Hand a frame set back so its buffers can be reused
    fn release(&mut self, frames: FrameSet);
}

/// Maps depth samples into the color camera's frame
pub trait Registration {
    /// Undistort `depth` and sample `color` at every depth pixel
    fn apply(&self, color: &RgbaImage, depth: &DepthImage) -> RegisteredFrames;
}

/// An opened sensor
pub trait SensorDevice: FrameSource {
    /// Serial number of the opened device
    fn serial(&self) -> &str;

    /// Firmware version string reported by the device
    fn firmware_version(&self) -> String;

    /// The packet pipeline the device is decoding with
    fn pipeline(&self) -> PipelineKind;

    /// Start streaming color, IR and depth
    fn start(&mut self) -> SensorResult<()>;

    /// Stop streaming. Must be called before `close()`.
    fn stop(&mut self) -> SensorResult<()>;

    /// Release the device
    fn close(&mut self) -> SensorResult<()>;

    /// Registration built from this device's calibration
    fn registration(&self) -> Box<dyn Registration>;

    /// View of this device as a plain frame source
    fn as_frame_source(&mut self) -> &mut dyn FrameSource;

    /// Wait for the next frame set, released when the guard drops
    fn wait_for_frames(&mut self) -> SensorResult<AcquiredFrames<'_>> {
        AcquiredFrames::acquire(self.as_frame_source())
    }
}

/// Enumerates and opens sensors
pub trait SensorBackend {
    /// Backend identifier
    fn backend_type(&self) -> SensorBackendType;

    /// List connected devices
    fn enumerate_devices(&self) -> Vec<SensorDeviceInfo>;

    /// Serial of the device used when none is given on the command line
    fn default_serial(&self) -> Option<String> {
        self.enumerate_devices()
            .into_iter()
            .next()
            .map(|device| device.serial)
    }

    /// Whether this backend can decode with `pipeline`
    fn supports_pipeline(&self, pipeline: PipelineKind) -> bool;

    /// Open the device with the given serial
    ///
    /// `None` selects the backend's default pipeline.
    fn open_device(
        &self,
        serial: &str,
        pipeline: Option<PipelineKind>,
    ) -> SensorResult<Box<dyn SensorDevice>>;
}

/// A frame set on loan from a [`FrameSource`]
///
/// Dereferences to the [`FrameSet`]. Dropping the guard releases the frames.
pub struct AcquiredFrames<'a> {
    source: &'a mut dyn FrameSource,
    frames: FrameSet,
}

impl<'a> AcquiredFrames<'a> {
    /// Wait for the next frame set from `source`
    pub fn acquire(source: &'a mut dyn FrameSource) -> SensorResult<Self> {
        let frames = source.wait_for_new_frame()?;
        Ok(Self { source, frames })
    }
}

impl Deref for AcquiredFrames<'_> {
    type Target = FrameSet;

    fn deref(&self) -> &FrameSet {
        &self.frames
    }
}

impl Drop for AcquiredFrames<'_> {
    fn drop(&mut self) {
        let frames = std::mem::replace(&mut self.frames, FrameSet::empty());
        self.source.release(frames);
    }
}

/// Get a backend instance for the given type
pub fn get_backend(backend_type: SensorBackendType) -> SensorResult<Box<dyn SensorBackend>> {
    match backend_type {
        SensorBackendType::Synthetic => Ok(Box::new(synthetic::SyntheticBackend::new())),
        SensorBackendType::Freedepth => freedepth_backend(),
    }
}

#[cfg(all(target_arch = "x86_64", feature = "freedepth"))]
fn freedepth_backend() -> SensorResult<Box<dyn SensorBackend>> {
    Ok(Box::new(freedepth::FreedepthBackend::new()))
}

#[cfg(not(all(target_arch = "x86_64", feature = "freedepth")))]
fn freedepth_backend() -> SensorResult<Box<dyn SensorBackend>> {
    Err(crate::errors::SensorError::Backend(
        "built without the `freedepth` feature".to_string(),
    ))
}
