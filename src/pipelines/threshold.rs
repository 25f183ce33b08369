// SPDX-License-Identifier: GPL-3.0-only

//! Depth to grayscale conversion and the interactive threshold

use image::{GrayImage, Luma};

use crate::backends::sensor::DepthImage;
use crate::constants::{MASK_OFF, MASK_ON, THRESHOLD_DISABLED, THRESHOLD_STEP};

/// Scale depth (mm) into 8-bit gray: `range_mm` and beyond are white
///
/// Values are rounded to nearest and saturated, so negative or NaN depth
/// becomes 0.
pub fn depth_to_gray(depth: &DepthImage, range_mm: f32) -> GrayImage {
    let range = f64::from(range_mm);
    GrayImage::from_fn(depth.width(), depth.height(), |x, y| {
        let mm = f64::from(depth.get_pixel(x, y).0[0]);
        // `as u8` saturates and maps NaN to 0
        Luma([(mm * 255.0 / range).round() as u8])
    })
}

/// Adjustable binary threshold
///
/// Negative values disable thresholding. The value is not clamped, so it can
/// be stepped below zero and back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    value: f32,
}

impl Threshold {
    pub fn new(value: f32) -> Self {
        Self { value }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn increase(&mut self) {
        self.value += THRESHOLD_STEP;
    }

    pub fn decrease(&mut self) {
        self.value -= THRESHOLD_STEP;
    }

    pub fn is_enabled(&self) -> bool {
        self.value >= 0.0
    }

    /// Mask of pixels strictly brighter than the threshold, or a copy of
    /// `gray` when disabled
    pub fn apply(&self, gray: &GrayImage) -> GrayImage {
        if !self.is_enabled() {
            return gray.clone();
        }
        let mut mask = gray.clone();
        for pixel in mask.pixels_mut() {
            pixel.0[0] = if f32::from(pixel.0[0]) > self.value {
                MASK_ON
            } else {
                MASK_OFF
            };
        }
        mask
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::new(THRESHOLD_DISABLED)
    }
}
