// SPDX-License-Identifier: GPL-3.0-only

//! Acquisition and display loop
//!
//! One iteration:
//!
//! ```text
//! wait for frame set ─▶ show rgb ─▶ register ─▶ depth→gray ─▶ threshold
//!        ▲                                                        │
//!        │                                                        ▼
//!   release (drop) ◀── handle key ◀── wait_key ◀── store ◀── rectify?
//! ```
//!
//! The loop is single threaded. It ends when the cancel token is set, when
//! Escape (or Ctrl+C in raw terminal mode) is pressed, or after the optional
//! frame limit. The device is always stopped and closed before returning.

pub mod cancel;

pub use cancel::CancelToken;

use std::time::Duration;

use image::GrayImage;
use tracing::{debug, info, warn};

use crate::backends::sensor::{DepthImage, FrameSet, Registration, SensorDevice};
use crate::config::Config;
use crate::constants::{WINDOW_OUTPUT, WINDOW_RGB};
use crate::errors::AppResult;
use crate::pipelines::rectify::{CornerFractions, rectify_quad};
use crate::pipelines::threshold::{Threshold, depth_to_gray};
use crate::preview::{Key, Preview, PreviewFrame};
use crate::storage::SlotRing;

/// Action returned by one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Per-session processing settings
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    /// Initial threshold; negative disables the mask
    pub threshold: f32,
    /// Rectification corners, resolved against each mask
    pub corners: Option<CornerFractions>,
    /// Depth mapped to full white
    pub depth_range_mm: f32,
    /// How long each refresh waits for a key
    pub refresh_interval: Duration,
    /// Stop after this many frames
    pub max_frames: Option<u64>,
}

impl CaptureSettings {
    pub fn from_config(config: &Config, max_frames: Option<u64>) -> Self {
        Self {
            threshold: config.threshold,
            corners: config.corners(),
            depth_range_mm: config.depth_range_mm,
            refresh_interval: config.refresh_interval(),
            max_frames,
        }
    }
}

/// Counters reported when a session ends
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoopSummary {
    /// Frame sets processed
    pub frames: u64,
    /// Frames whose output was rectified
    pub rectified: u64,
    /// Frames where rectification failed and the mask was used instead
    pub fallbacks: u64,
    /// Threshold when the loop ended
    pub final_threshold: f32,
}

/// Output of the per-frame image processing
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFrame {
    pub output: GrayImage,
    /// False if no corners were given or rectification fell back to the mask
    pub rectified: bool,
}

/// Convert, threshold and optionally rectify one undistorted depth frame
pub fn process_frame(
    undistorted: &DepthImage,
    threshold: &Threshold,
    corners: Option<&CornerFractions>,
    depth_range_mm: f32,
) -> ProcessedFrame {
    let gray = depth_to_gray(undistorted, depth_range_mm);
    let mask = threshold.apply(&gray);

    let Some(corners) = corners else {
        return ProcessedFrame {
            output: mask,
            rectified: false,
        };
    };

    let quad = corners.resolve(mask.width(), mask.height());
    match rectify_quad(&mask, &quad) {
        Ok(output) => ProcessedFrame {
            output,
            rectified: true,
        },
        Err(e) => {
            warn!(error = %e, ?quad, "Rectification failed, using unrectified mask");
            ProcessedFrame {
                output: mask,
                rectified: false,
            }
        }
    }
}

/// Run a capture session on an opened device
///
/// Starts the device, loops until shutdown, then stops and closes it, also
/// when the loop fails.
pub fn run_session(
    device: &mut dyn SensorDevice,
    preview: &mut dyn Preview,
    slots: &mut SlotRing,
    settings: &CaptureSettings,
    cancel: &CancelToken,
) -> AppResult<LoopSummary> {
    if let Err(e) = device.start() {
        if let Err(close_err) = device.close() {
            warn!(error = %close_err, "Failed to close device");
        }
        return Err(e.into());
    }
    info!(
        serial = %device.serial(),
        firmware = %device.firmware_version(),
        pipeline = %device.pipeline(),
        "Device started"
    );

    let result = capture_loop(device, preview, slots, settings, cancel);

    let stopped = device.stop();
    let closed = device.close();
    info!("Device stopped and closed");

    let summary = result?;
    stopped?;
    closed?;

    info!(
        frames = summary.frames,
        rectified = summary.rectified,
        fallbacks = summary.fallbacks,
        "Capture session ended"
    );
    Ok(summary)
}

fn capture_loop(
    device: &mut dyn SensorDevice,
    preview: &mut dyn Preview,
    slots: &mut SlotRing,
    settings: &CaptureSettings,
    cancel: &CancelToken,
) -> AppResult<LoopSummary> {
    let registration = device.registration();
    let mut threshold = Threshold::new(settings.threshold);
    let mut summary = LoopSummary::default();

    loop {
        if cancel.is_cancelled() {
            info!("Shutdown requested");
            break;
        }
        if settings.max_frames.is_some_and(|max| summary.frames >= max) {
            info!(frames = summary.frames, "Frame limit reached");
            break;
        }

        let action = {
            let frames = device.wait_for_frames()?;
            run_iteration(
                &frames,
                registration.as_ref(),
                preview,
                slots,
                settings,
                &mut threshold,
                &mut summary,
            )?
            // frames released here
        };

        if action == LoopAction::Stop {
            break;
        }
    }

    summary.final_threshold = threshold.value();
    Ok(summary)
}

fn run_iteration(
    frames: &FrameSet,
    registration: &dyn Registration,
    preview: &mut dyn Preview,
    slots: &mut SlotRing,
    settings: &CaptureSettings,
    threshold: &mut Threshold,
    summary: &mut LoopSummary,
) -> AppResult<LoopAction> {
    preview.show(WINDOW_RGB, PreviewFrame::Rgba(&frames.color))?;

    let registered = registration.apply(&frames.color, &frames.depth);
    let processed = process_frame(
        &registered.undistorted,
        threshold,
        settings.corners.as_ref(),
        settings.depth_range_mm,
    );

    summary.frames += 1;
    if processed.rectified {
        summary.rectified += 1;
    } else if settings.corners.is_some() {
        summary.fallbacks += 1;
    }

    preview.show(WINDOW_OUTPUT, PreviewFrame::Gray(&processed.output))?;

    match slots.store(&processed.output) {
        Ok(path) => debug!(path = %path.display(), sequence = frames.sequence, "Output saved"),
        Err(e) => warn!(error = %e, "Failed to save output"),
    }

    preview.set_status(&format!(
        "frame {} | threshold {} | Up/Down adjust | Esc quit",
        frames.sequence,
        threshold.value()
    ));

    let key = preview.wait_key(settings.refresh_interval)?;
    Ok(handle_key(key, threshold))
}

/// Apply a key press to the threshold; Escape and Ctrl+C stop the loop
pub fn handle_key(key: Option<Key>, threshold: &mut Threshold) -> LoopAction {
    match key {
        Some(key) if key.requests_shutdown() => {
            info!(?key, "Quit requested");
            LoopAction::Stop
        }
        Some(Key::Up) => {
            threshold.increase();
            info!(threshold = threshold.value(), "Increasing threshold");
            LoopAction::Continue
        }
        Some(Key::Down) => {
            threshold.decrease();
            info!(threshold = threshold.value(), "Decreasing threshold");
            LoopAction::Continue
        }
        _ => LoopAction::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{MASK_OFF, MASK_ON};

    fn depth(values: &[f32], width: u32) -> DepthImage {
        DepthImage::from_raw(width, values.len() as u32 / width, values.to_vec()).unwrap()
    }

    #[test]
    fn test_handle_key() {
        let mut threshold = Threshold::new(10.0);
        assert_eq!(handle_key(Some(Key::Up), &mut threshold), LoopAction::Continue);
        assert_eq!(threshold.value(), 11.0);
        assert_eq!(handle_key(Some(Key::Down), &mut threshold), LoopAction::Continue);
        assert_eq!(handle_key(Some(Key::Down), &mut threshold), LoopAction::Continue);
        assert_eq!(threshold.value(), 9.0);
        assert_eq!(handle_key(None, &mut threshold), LoopAction::Continue);
        assert_eq!(handle_key(Some(Key::Char('x')), &mut threshold), LoopAction::Continue);
        assert_eq!(handle_key(Some(Key::Escape), &mut threshold), LoopAction::Stop);
        assert_eq!(handle_key(Some(Key::Interrupt), &mut threshold), LoopAction::Stop);
    }

    #[test]
    fn test_process_without_corners() {
        let undistorted = depth(&[0.0, 4500.0, 1000.0, 3000.0], 2);
        let processed = process_frame(&undistorted, &Threshold::new(100.0), None, 4500.0);
        assert!(!processed.rectified);
        // 1000 mm -> 57, 3000 mm -> 170
        assert_eq!(
            processed.output.into_raw(),
            vec![MASK_OFF, MASK_ON, MASK_OFF, MASK_ON]
        );
    }

    #[test]
    fn test_degenerate_corners_fall_back() {
        let undistorted = DepthImage::from_pixel(20, 10, image::Luma([4500.0]));
        let collinear = CornerFractions([0.0, 0.0, 0.5, 0.0, 1.0, 0.0, 0.0, 1.0]);
        let processed = process_frame(
            &undistorted,
            &Threshold::default(),
            Some(&collinear),
            4500.0,
        );
        assert!(!processed.rectified);
        assert_eq!(processed.output.dimensions(), (20, 10));
    }

    #[test]
    fn test_full_frame_corners_rectify() {
        let undistorted = DepthImage::from_pixel(20, 10, image::Luma([4500.0]));
        let full = CornerFractions([0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
        let processed = process_frame(&undistorted, &Threshold::default(), Some(&full), 4500.0);
        assert!(processed.rectified);
        // Edges span width-1 and height-1 pixels
        assert_eq!(processed.output.dimensions(), (19, 9));
    }
}
