// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic sensor backend
//!
//! Produces deterministic frame sets without hardware: a tilted floor that
//! recedes towards the top of the frame, a box that slides sideways with the
//! sequence number, and a ring of invalid (zero) depth around the border.
//! Used for headless runs, demos, and tests of everything downstream of the
//! sensor seam.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::{Rgba, RgbaImage};
use tracing::{debug, info};

use super::{
    DepthImage, FrameSet, FrameSource, PipelineKind, RegisteredFrames, Registration,
    SensorBackend, SensorBackendType, SensorDevice, SensorDeviceInfo, SensorResult,
};
use crate::constants::{
    COLOR_FRAME_HEIGHT, COLOR_FRAME_WIDTH, DEPTH_FRAME_HEIGHT, DEPTH_FRAME_WIDTH,
};
use crate::errors::SensorError;

/// Serial reported by the default synthetic device
pub const SYNTHETIC_SERIAL: &str = "000000000000";

/// Nearest depth in the generated scene (top of the box), mm
const BOX_DEPTH_MM: f32 = 800.0;
/// Floor depth at the bottom row, mm
const FLOOR_NEAR_MM: f32 = 1000.0;
/// Floor depth at the top row, mm
const FLOOR_FAR_MM: f32 = 4000.0;
/// Width of the invalid border ring, pixels
const INVALID_BORDER: u32 = 4;

/// Lifecycle counters shared between a backend and the devices it opens
#[derive(Debug, Default)]
pub struct SyntheticStats {
    acquired: AtomicU64,
    released: AtomicU64,
    starts: AtomicU64,
    stops: AtomicU64,
    closes: AtomicU64,
}

impl SyntheticStats {
    /// Frame sets handed out
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Frame sets returned
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// Number of `start()` calls
    pub fn starts(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of `stop()` calls
    pub fn stops(&self) -> u64 {
        self.stops.load(Ordering::SeqCst)
    }

    /// Number of `close()` calls
    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Backend producing generated frame sets
pub struct SyntheticBackend {
    devices: Vec<SensorDeviceInfo>,
    stats: Arc<SyntheticStats>,
}

impl SyntheticBackend {
    /// A backend with a single device
    pub fn new() -> Self {
        Self::with_serials(&[SYNTHETIC_SERIAL])
    }

    /// A backend exposing one device per serial (empty slice = nothing connected)
    pub fn with_serials(serials: &[&str]) -> Self {
        let devices = serials
            .iter()
            .enumerate()
            .map(|(index, serial)| SensorDeviceInfo {
                serial: serial.to_string(),
                name: format!("Synthetic depth sensor {}", index),
                location: Some(format!("synthetic:{}", index)),
            })
            .collect();

        Self {
            devices,
            stats: Arc::new(SyntheticStats::default()),
        }
    }

    /// Counters for every device this backend opens
    pub fn stats(&self) -> Arc<SyntheticStats> {
        Arc::clone(&self.stats)
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorBackend for SyntheticBackend {
    fn backend_type(&self) -> SensorBackendType {
        SensorBackendType::Synthetic
    }

    fn enumerate_devices(&self) -> Vec<SensorDeviceInfo> {
        self.devices.clone()
    }

    fn supports_pipeline(&self, _pipeline: PipelineKind) -> bool {
        true
    }

    fn open_device(
        &self,
        serial: &str,
        pipeline: Option<PipelineKind>,
    ) -> SensorResult<Box<dyn SensorDevice>> {
        let info = self
            .devices
            .iter()
            .find(|device| device.serial == serial)
            .cloned()
            .ok_or_else(|| SensorError::OpenFailed(format!("no device with serial {}", serial)))?;

        let pipeline = pipeline.unwrap_or_default();
        info!(serial = %info.serial, pipeline = %pipeline, "Opened synthetic sensor");

        Ok(Box::new(SyntheticDevice {
            info,
            pipeline,
            streaming: false,
            closed: false,
            outstanding: false,
            sequence: 0,
            spare: None,
            stats: Arc::clone(&self.stats),
        }))
    }
}

/// An opened synthetic device
pub struct SyntheticDevice {
    info: SensorDeviceInfo,
    pipeline: PipelineKind,
    streaming: bool,
    closed: bool,
    outstanding: bool,
    sequence: u64,
    /// Released buffers, reused for the next frame set
    spare: Option<FrameSet>,
    stats: Arc<SyntheticStats>,
}

impl SyntheticDevice {
    fn fill_frames(&mut self, frames: &mut FrameSet) {
        frames.sequence = self.sequence;
        fill_depth(&mut frames.depth, self.sequence);
        fill_ir(&mut frames.ir, &frames.depth);
        fill_color(&mut frames.color, self.sequence);
    }
}

impl FrameSource for SyntheticDevice {
    fn wait_for_new_frame(&mut self) -> SensorResult<FrameSet> {
        if self.closed || !self.streaming {
            return Err(SensorError::NotStarted);
        }
        if self.outstanding {
            return Err(SensorError::FramesNotReleased);
        }

        self.sequence += 1;
        let mut frames = match self.spare.take() {
            Some(frames) if !frames.is_empty() => frames,
            _ => FrameSet {
                sequence: 0,
                color: RgbaImage::new(COLOR_FRAME_WIDTH, COLOR_FRAME_HEIGHT),
                ir: DepthImage::new(DEPTH_FRAME_WIDTH, DEPTH_FRAME_HEIGHT),
                depth: DepthImage::new(DEPTH_FRAME_WIDTH, DEPTH_FRAME_HEIGHT),
            },
        };
        self.fill_frames(&mut frames);

        self.outstanding = true;
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(frames)
    }

    fn release(&mut self, frames: FrameSet) {
        debug!(sequence = frames.sequence, "Frame set released");
        self.outstanding = false;
        self.spare = Some(frames);
        self.stats.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl SensorDevice for SyntheticDevice {
    fn serial(&self) -> &str {
        &self.info.serial
    }

    fn firmware_version(&self) -> String {
        "synthetic-1.0".to_string()
    }

    fn pipeline(&self) -> PipelineKind {
        self.pipeline
    }

    fn start(&mut self) -> SensorResult<()> {
        if self.closed {
            return Err(SensorError::Backend("device is closed".to_string()));
        }
        self.streaming = true;
        self.stats.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> SensorResult<()> {
        self.streaming = false;
        self.stats.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> SensorResult<()> {
        self.closed = true;
        self.spare = None;
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn registration(&self) -> Box<dyn Registration> {
        Box::new(SyntheticRegistration)
    }

    fn as_frame_source(&mut self) -> &mut dyn FrameSource {
        self
    }
}

/// Registration for generated frames
///
/// The synthetic depth camera has no lens distortion and shares its optical
/// centre with the color camera, so undistortion is a copy and registration
/// is a nearest-neighbour rescale of the color frame.
pub struct SyntheticRegistration;

impl Registration for SyntheticRegistration {
    fn apply(&self, color: &RgbaImage, depth: &DepthImage) -> RegisteredFrames {
        let (width, height) = depth.dimensions();
        let (color_width, color_height) = color.dimensions();

        let registered = RgbaImage::from_fn(width, height, |x, y| {
            let has_depth = depth.get_pixel(x, y).0[0] > 0.0;
            if !has_depth || color_width == 0 || color_height == 0 {
                return Rgba([0, 0, 0, 0]);
            }
            let cx = (u64::from(x) * u64::from(color_width) / u64::from(width)) as u32;
            let cy = (u64::from(y) * u64::from(color_height) / u64::from(height)) as u32;
            *color.get_pixel(cx.min(color_width - 1), cy.min(color_height - 1))
        });

        RegisteredFrames {
            undistorted: depth.clone(),
            registered,
        }
    }
}

fn fill_depth(depth: &mut DepthImage, sequence: u64) {
    let (width, height) = depth.dimensions();
    let box_width = width / 4;
    let box_height = height / 4;
    let box_left = ((sequence * 8) % u64::from(width - box_width)) as u32;
    let box_top = height / 2 - box_height / 2;

    for (x, y, pixel) in depth.enumerate_pixels_mut() {
        let on_border = x < INVALID_BORDER
            || y < INVALID_BORDER
            || x >= width - INVALID_BORDER
            || y >= height - INVALID_BORDER;
        let in_box = x >= box_left
            && x < box_left + box_width
            && y >= box_top
            && y < box_top + box_height;

        pixel.0[0] = if on_border {
            0.0
        } else if in_box {
            BOX_DEPTH_MM
        } else {
            let t = y as f32 / (height - 1) as f32;
            FLOOR_FAR_MM + (FLOOR_NEAR_MM - FLOOR_FAR_MM) * t
        };
    }
}

fn fill_ir(ir: &mut DepthImage, depth: &DepthImage) {
    for (x, y, pixel) in ir.enumerate_pixels_mut() {
        let d = depth.get_pixel(x, y).0[0];
        // Closer surfaces return more light
        pixel.0[0] = if d > 0.0 { 20_000.0 * (FLOOR_NEAR_MM / d).min(1.0) } else { 0.0 };
    }
}

fn fill_color(color: &mut RgbaImage, sequence: u64) {
    let (width, height) = color.dimensions();
    let blue = ((sequence * 8) % 256) as u8;
    for (x, y, pixel) in color.enumerate_pixels_mut() {
        let red = (x * 255 / (width - 1).max(1)) as u8;
        let green = (y * 255 / (height - 1).max(1)) as u8;
        *pixel = Rgba([red, green, blue, 255]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sensor::AcquiredFrames;

    fn open_started() -> Box<dyn SensorDevice> {
        let backend = SyntheticBackend::new();
        let mut device = backend.open_device(SYNTHETIC_SERIAL, None).unwrap();
        device.start().unwrap();
        device
    }

    #[test]
    fn test_enumeration() {
        let backend = SyntheticBackend::with_serials(&["123", "456"]);
        assert_eq!(backend.enumerate_devices().len(), 2);
        assert_eq!(backend.default_serial().as_deref(), Some("123"));

        let empty = SyntheticBackend::with_serials(&[]);
        assert!(empty.default_serial().is_none());
    }

    #[test]
    fn test_open_unknown_serial_fails() {
        let backend = SyntheticBackend::new();
        let result = backend.open_device("999", None);
        assert!(matches!(result, Err(SensorError::OpenFailed(_))));
    }

    #[test]
    fn test_frames_require_start() {
        let backend = SyntheticBackend::new();
        let mut device = backend.open_device(SYNTHETIC_SERIAL, None).unwrap();
        assert_eq!(
            device.wait_for_new_frame().unwrap_err(),
            SensorError::NotStarted
        );
    }

    #[test]
    fn test_frame_dimensions_and_sequence() {
        let mut device = open_started();
        for expected in 1..=3 {
            let frames = AcquiredFrames::acquire(device.as_frame_source()).unwrap();
            assert_eq!(frames.sequence, expected);
            assert_eq!(frames.depth.dimensions(), (DEPTH_FRAME_WIDTH, DEPTH_FRAME_HEIGHT));
            assert_eq!(frames.ir.dimensions(), (DEPTH_FRAME_WIDTH, DEPTH_FRAME_HEIGHT));
            assert_eq!(frames.color.dimensions(), (COLOR_FRAME_WIDTH, COLOR_FRAME_HEIGHT));
        }
    }

    #[test]
    fn test_unreleased_frames_block_next_wait() {
        let mut device = open_started();
        let held = device.wait_for_new_frame().unwrap();
        assert_eq!(
            device.wait_for_new_frame().unwrap_err(),
            SensorError::FramesNotReleased
        );
        device.release(held);
        assert!(device.wait_for_new_frame().is_ok());
    }

    #[test]
    fn test_depth_scene() {
        let mut device = open_started();
        let frames = device.wait_for_new_frame().unwrap();
        assert_eq!(frames.depth.get_pixel(0, 0).0[0], 0.0);
        let bottom = frames.depth.get_pixel(DEPTH_FRAME_WIDTH / 2, DEPTH_FRAME_HEIGHT - 5).0[0];
        let top = frames.depth.get_pixel(DEPTH_FRAME_WIDTH - 10, 5).0[0];
        assert!(bottom < top);
        device.release(frames);
    }

    #[test]
    fn test_registration_masks_missing_depth() {
        let mut device = open_started();
        let registration = device.registration();
        let frames = device.wait_for_new_frame().unwrap();
        let registered = registration.apply(&frames.color, &frames.depth);
        assert_eq!(registered.undistorted.dimensions(), frames.depth.dimensions());
        assert_eq!(registered.registered.get_pixel(0, 0).0[3], 0);
        assert_eq!(registered.registered.get_pixel(100, 100).0[3], 255);
        device.release(frames);
    }

    #[test]
    fn test_stats_track_lifecycle() {
        let backend = SyntheticBackend::new();
        let stats = backend.stats();
        let mut device = backend.open_device(SYNTHETIC_SERIAL, Some(PipelineKind::OpenCl)).unwrap();
        assert_eq!(device.pipeline(), PipelineKind::OpenCl);
        device.start().unwrap();
        drop(AcquiredFrames::acquire(device.as_frame_source()).unwrap());
        device.stop().unwrap();
        device.close().unwrap();
        assert_eq!(stats.acquired(), 1);
        assert_eq!(stats.released(), 1);
        assert_eq!((stats.starts(), stats.stops(), stats.closes()), (1, 1, 1));
    }
}
