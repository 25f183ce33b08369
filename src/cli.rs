// SPDX-License-Identifier: GPL-3.0-only

//! Command-line helpers
//!
//! This module provides:
//! - Lenient scanning of the positional launch tokens
//! - Picking the device to open
//! - Listing available sensors

use std::path::PathBuf;

use tracing::warn;

use crate::backends::sensor::{PipelineKind, SensorBackend, SensorResult};
use crate::config::Config;
use crate::errors::SensorError;
use crate::pipelines::rectify::CornerFractions;

/// Options gathered from the positional tokens
///
/// Tokens may appear in any order. Anything that cannot be understood is
/// logged and skipped, and the affected option keeps its default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchOptions {
    /// First pipeline selector seen (`cpu`, `gl`, `cl`)
    pub pipeline: Option<PipelineKind>,
    /// `-t <float>`
    pub threshold: Option<f32>,
    /// `-p <8 floats>`
    pub corners: Option<CornerFractions>,
    /// `-o <path>`
    pub output_dir: Option<PathBuf>,
    /// Bare all-digit token
    pub serial: Option<String>,
    /// `--headless` given after the first launch token
    pub headless: bool,
    /// `--frames <n>` given after the first launch token
    pub frames: Option<u64>,
    /// Tokens that were skipped
    pub ignored: Vec<String>,
}

impl LaunchOptions {
    /// Scan `tokens` left to right
    pub fn scan<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut options = LaunchOptions::default();
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i].as_ref();
            i += 1;

            if let Some(kind) = PipelineKind::from_token(token) {
                if options.pipeline.is_none() {
                    options.pipeline = Some(kind);
                } else {
                    warn!(token, "Pipeline already selected, ignoring");
                }
                continue;
            }

            match token {
                "-t" => match tokens.get(i).map(|t| t.as_ref()) {
                    Some(value) => {
                        i += 1;
                        match value.parse::<f32>() {
                            Ok(threshold) if threshold.is_finite() => {
                                options.threshold = Some(threshold)
                            }
                            _ => warn!(value, "Invalid threshold, keeping default"),
                        }
                    }
                    None => warn!("-t given without a value"),
                },
                "-p" => {
                    let end = (i + 8).min(tokens.len());
                    let values = &tokens[i..end];
                    i = end;
                    match CornerFractions::parse(values) {
                        Some(corners) => options.corners = Some(corners),
                        None => warn!(
                            count = values.len(),
                            "-p needs eight numbers, rectification disabled"
                        ),
                    }
                }
                "-o" => match tokens.get(i) {
                    Some(value) => {
                        i += 1;
                        options.output_dir = Some(PathBuf::from(value.as_ref()));
                    }
                    None => warn!("-o given without a path"),
                },
                // clap hands everything after the first launch token over
                // verbatim, including its own long options
                "--headless" => options.headless = true,
                "--frames" => match tokens.get(i).map(|t| t.as_ref()) {
                    Some(value) => {
                        i += 1;
                        match value.parse::<u64>() {
                            Ok(frames) => options.frames = Some(frames),
                            Err(_) => warn!(value, "Invalid frame count, ignoring"),
                        }
                    }
                    None => warn!("--frames given without a value"),
                },
                _ if is_serial(token) => options.serial = Some(token.to_string()),
                _ => {
                    warn!(token, "Unrecognized argument, ignoring");
                    options.ignored.push(token.to_string());
                }
            }
        }

        options
    }

    /// Override config values with whatever was given on the command line
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(pipeline) = self.pipeline {
            config.pipeline = Some(pipeline);
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(corners) = self.corners {
            config.corner_fractions = Some(corners.0);
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
    }
}

/// Serial of the device to open: the one asked for, else the first found
///
/// Fails with [`SensorError::NoDeviceFound`] when nothing is connected.
pub fn resolve_serial(
    backend: &dyn SensorBackend,
    requested: Option<&str>,
) -> SensorResult<String> {
    match requested {
        Some(serial) => Ok(serial.to_string()),
        None => backend.default_serial().ok_or(SensorError::NoDeviceFound),
    }
}

fn is_serial(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Print the devices a backend can see
pub fn list_devices(backend: &dyn SensorBackend) {
    let devices = backend.enumerate_devices();

    if devices.is_empty() {
        println!("No devices found.");
        return;
    }

    println!("Available devices ({}):", backend.backend_type());
    println!();
    for (index, device) in devices.iter().enumerate() {
        println!("  [{}] {}", index, device.name);
        println!("      Serial: {}", device.serial);
        if let Some(location) = &device.location {
            println!("      Location: {}", location);
        }
        let pipelines: Vec<&str> = PipelineKind::ALL
            .iter()
            .filter(|kind| backend.supports_pipeline(**kind))
            .map(|kind| kind.token())
            .collect();
        println!("      Pipelines: {}", pipelines.join(", "));
        println!();
    }
}
