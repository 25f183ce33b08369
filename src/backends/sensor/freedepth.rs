// SPDX-License-Identifier: GPL-3.0-only

//! Kinect sensor backend built on the freedepth userspace driver
//!
//! The kernel driver is unbound while streaming and rebound on `close()`.
//! Only software decoding is available, so every pipeline other than
//! [`PipelineKind::Cpu`] is refused at open time.

use std::sync::mpsc::Receiver;

use freedepth::{
    DepthFormat, DepthFrame, DepthRegistration, KinectStreamer, Resolution, VideoFormat,
    VideoFrame,
};
use image::{Rgba, RgbaImage};
use tracing::{debug, info, warn};

use super::{
    DepthImage, FrameSet, FrameSource, PipelineKind, RegisteredFrames, Registration,
    SensorBackend, SensorBackendType, SensorDevice, SensorDeviceInfo, SensorResult,
};
use crate::errors::SensorError;

/// Backend enumerating Kinect sensors through freedepth
pub struct FreedepthBackend;

impl FreedepthBackend {
    pub fn new() -> Self {
        Self
    }

    fn device_index(serial: &str) -> SensorResult<usize> {
        let devices = freedepth::enumerate_devices()
            .map_err(|e| SensorError::OpenFailed(format!("enumeration failed: {}", e)))?;
        devices
            .iter()
            .find(|dev| dev.id.serial.as_deref() == Some(serial))
            .map(|dev| dev.index)
            .ok_or_else(|| SensorError::OpenFailed(format!("no device with serial {}", serial)))
    }
}

impl Default for FreedepthBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorBackend for FreedepthBackend {
    fn backend_type(&self) -> SensorBackendType {
        SensorBackendType::Freedepth
    }

    fn enumerate_devices(&self) -> Vec<SensorDeviceInfo> {
        let devices = match freedepth::enumerate_devices() {
            Ok(d) => d,
            Err(e) => {
                debug!("Failed to enumerate depth sensors: {}", e);
                return Vec::new();
            }
        };

        devices
            .iter()
            .map(|dev| {
                let serial = dev
                    .id
                    .serial
                    .clone()
                    .unwrap_or_else(|| format!("{}", dev.index));
                info!(name = %dev.name, serial = %serial, "Found depth sensor via freedepth");
                SensorDeviceInfo {
                    serial,
                    name: dev.name.clone(),
                    location: Some(format!("bus {} addr {}", dev.id.bus, dev.id.address)),
                }
            })
            .collect()
    }

    fn supports_pipeline(&self, pipeline: PipelineKind) -> bool {
        pipeline == PipelineKind::Cpu
    }

    fn open_device(
        &self,
        serial: &str,
        pipeline: Option<PipelineKind>,
    ) -> SensorResult<Box<dyn SensorDevice>> {
        let pipeline = pipeline.unwrap_or_default();
        if !self.supports_pipeline(pipeline) {
            return Err(SensorError::OpenFailed(format!(
                "{} pipeline is not supported by freedepth",
                pipeline
            )));
        }

        let index = Self::device_index(serial)?;
        let streamer = KinectStreamer::new(index)
            .map_err(|e| SensorError::OpenFailed(format!("failed to create streamer: {}", e)))?;

        info!(serial = %serial, index, "Opened depth sensor");

        Ok(Box::new(FreedepthDevice {
            serial: serial.to_string(),
            streamer: Some(streamer),
            receivers: None,
            depth_to_mm: None,
            calibration: None,
            outstanding: false,
            sequence: 0,
            last_color: None,
        }))
    }
}

/// An opened Kinect
pub struct FreedepthDevice {
    serial: String,
    streamer: Option<KinectStreamer>,
    receivers: Option<(Receiver<VideoFrame>, Receiver<DepthFrame>)>,
    depth_to_mm: Option<freedepth::DepthToMm>,
    /// Registration tables read from the device at `start()`
    calibration: Option<TableRegistration>,
    outstanding: bool,
    sequence: u64,
    /// Most recent color frame, paired with the next depth frame
    last_color: Option<RgbaImage>,
}

impl FreedepthDevice {
    fn next_color(&mut self, video_rx: &Receiver<VideoFrame>) -> SensorResult<RgbaImage> {
        // Drain anything queued so the newest color frame is used
        while let Ok(frame) = video_rx.try_recv() {
            self.last_color = Some(video_to_rgba(&frame));
        }
        if let Some(color) = self.last_color.clone() {
            return Ok(color);
        }
        let frame = video_rx.recv().map_err(|_| SensorError::StreamEnded)?;
        let color = video_to_rgba(&frame);
        self.last_color = Some(color.clone());
        Ok(color)
    }
}

impl FrameSource for FreedepthDevice {
    fn wait_for_new_frame(&mut self) -> SensorResult<FrameSet> {
        if self.outstanding {
            return Err(SensorError::FramesNotReleased);
        }
        let (video_rx, depth_rx) = self.receivers.take().ok_or(SensorError::NotStarted)?;

        let result: SensorResult<(RgbaImage, DepthImage)> = (|| {
            let depth_frame = depth_rx.recv().map_err(|_| SensorError::StreamEnded)?;
            let color = self.next_color(&video_rx)?;
            let converter = self.depth_to_mm.as_ref().ok_or(SensorError::NotStarted)?;
            let depth = depth_to_image(&depth_frame, converter)?;
            Ok((color, depth))
        })();
        self.receivers = Some((video_rx, depth_rx));

        let (color, depth) = result?;
        self.sequence += 1;
        self.outstanding = true;

        Ok(FrameSet {
            sequence: self.sequence,
            color,
            // Video and IR share an endpoint; IR is not streamed alongside color
            ir: DepthImage::new(depth.width(), depth.height()),
            depth,
        })
    }

    fn release(&mut self, frames: FrameSet) {
        debug!(sequence = frames.sequence, "Frame set released");
        self.outstanding = false;
    }
}

impl SensorDevice for FreedepthDevice {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn firmware_version(&self) -> String {
        "unknown".to_string()
    }

    fn pipeline(&self) -> PipelineKind {
        PipelineKind::Cpu
    }

    fn start(&mut self) -> SensorResult<()> {
        let streamer = self
            .streamer
            .as_mut()
            .ok_or_else(|| SensorError::Backend("device is closed".to_string()))?;

        let (video_rx, depth_rx) = streamer
            .start(VideoFormat::Bayer, Resolution::Medium, DepthFormat::Depth11Bit)
            .map_err(|e| SensorError::Backend(format!("failed to start streaming: {}", e)))?;

        let registration = streamer.create_depth_registration();
        self.depth_to_mm = Some(registration.depth_to_mm().clone());
        self.calibration = Some(TableRegistration {
            table: registration.registration_table_flat().to_vec(),
            shift: registration.depth_to_rgb_shift_table().to_vec(),
            target_offset: registration.target_offset(),
        });
        info!(
            target_offset = registration.target_offset(),
            "Fetched depth registration"
        );
        self.receivers = Some((video_rx, depth_rx));
        info!("Depth sensor streaming");
        Ok(())
    }

    fn stop(&mut self) -> SensorResult<()> {
        self.receivers = None;
        if let Some(streamer) = self.streamer.as_mut() {
            streamer.stop();
        }
        Ok(())
    }

    fn close(&mut self) -> SensorResult<()> {
        if let Some(mut streamer) = self.streamer.take()
            && let Err(e) = streamer.rebind_driver()
        {
            warn!("Failed to rebind kernel driver: {}", e);
        }
        self.last_color = None;
        Ok(())
    }

    fn registration(&self) -> Box<dyn Registration> {
        match &self.calibration {
            Some(calibration) => Box::new(calibration.clone()),
            None => {
                warn!("No device calibration yet, color is only rescaled");
                Box::new(ScaledRegistration)
            }
        }
    }

    fn as_frame_source(&mut self) -> &mut dyn FrameSource {
        self
    }
}

/// Width of the grid the registration tables are laid out on
const REGISTRATION_WIDTH: u32 = 640;

/// Fixed-point scale of the table x values
const REGISTRATION_X_SCALE: i32 = 256;

/// Largest depth the shift table covers
const MAX_SHIFT_DEPTH_MM: usize = 10_000;

/// Depth-to-color registration from the device's factory tables
///
/// Each depth pixel has a base color coordinate in the table; the x
/// coordinate is shifted by a depth dependent parallax term.
#[derive(Debug, Clone)]
struct TableRegistration {
    /// `[x * 256, y]` per depth pixel
    table: Vec<[i32; 2]>,
    /// Parallax shift indexed by depth in mm
    shift: Vec<i32>,
    target_offset: u32,
}

impl TableRegistration {
    /// Color pixel seen by depth pixel `(x, y)` at `depth_mm`
    fn color_coords(
        &self,
        x: u32,
        y: u32,
        depth_mm: u32,
        depth_width: u32,
        color: (u32, u32),
    ) -> Option<(u32, u32)> {
        let reg = *self.table.get((y * depth_width + x) as usize)?;
        let shift = *self
            .shift
            .get((depth_mm as usize).min(MAX_SHIFT_DEPTH_MM))?;

        let base_x = (reg[0] + shift) / REGISTRATION_X_SCALE;
        let base_y = reg[1] - self.target_offset as i32;

        // Higher color resolutions keep the aspect ratio and crop at the bottom
        let scale = color.0 as f32 / REGISTRATION_WIDTH as f32;
        let cx = (base_x as f32 * scale) as i32;
        let cy = (base_y as f32 * scale) as i32;

        if cx < 0 || cy < 0 || cx >= color.0 as i32 || cy >= color.1 as i32 {
            return None;
        }
        Some((cx as u32, cy as u32))
    }
}

impl Registration for TableRegistration {
    fn apply(&self, color: &RgbaImage, depth: &DepthImage) -> RegisteredFrames {
        let (width, height) = depth.dimensions();
        let registered = RgbaImage::from_fn(width, height, |x, y| {
            let mm = depth.get_pixel(x, y).0[0];
            if mm <= 0.0 {
                return Rgba([0, 0, 0, 0]);
            }
            match self.color_coords(x, y, mm as u32, width, color.dimensions()) {
                Some((cx, cy)) => *color.get_pixel(cx, cy),
                None => Rgba([0, 0, 0, 0]),
            }
        });
        RegisteredFrames {
            undistorted: depth.clone(),
            registered,
        }
    }
}

/// Registration that rescales color to the depth grid, used until the
/// device calibration has been read
struct ScaledRegistration;

impl Registration for ScaledRegistration {
    fn apply(&self, color: &RgbaImage, depth: &DepthImage) -> RegisteredFrames {
        let (width, height) = depth.dimensions();
        let (color_width, color_height) = color.dimensions();
        let registered = RgbaImage::from_fn(width, height, |x, y| {
            if depth.get_pixel(x, y).0[0] <= 0.0 || color_width == 0 || color_height == 0 {
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

fn video_to_rgba(frame: &VideoFrame) -> RgbaImage {
    let pixels = (frame.width * frame.height) as usize;
    let mut rgb = vec![0u8; pixels * 3];
    freedepth::convert_bayer_to_rgb(&frame.data, &mut rgb, frame.width, frame.height);
    RgbaImage::from_fn(frame.width, frame.height, |x, y| {
        let i = ((y * frame.width + x) * 3) as usize;
        Rgba([rgb[i], rgb[i + 1], rgb[i + 2], 255])
    })
}

fn depth_to_image(
    frame: &DepthFrame,
    converter: &freedepth::DepthToMm,
) -> SensorResult<DepthImage> {
    let raw = frame
        .as_u16()
        .ok_or_else(|| SensorError::Backend("depth frame has unexpected layout".to_string()))?;
    let mut mm = vec![0u16; raw.len()];
    converter.convert_frame(raw, &mut mm);

    let data: Vec<f32> = mm.into_iter().map(f32::from).collect();
    DepthImage::from_raw(frame.width, frame.height, data)
        .ok_or_else(|| SensorError::Backend("depth frame size mismatch".to_string()))
}
