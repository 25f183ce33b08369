// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for launch-token scanning

use depth_rectify::backends::sensor::PipelineKind;
use depth_rectify::backends::sensor::synthetic::{SYNTHETIC_SERIAL, SyntheticBackend};
use depth_rectify::cli::{LaunchOptions, resolve_serial};
use depth_rectify::errors::{AppError, SensorError};
use depth_rectify::pipelines::rectify::CornerFractions;
use std::path::PathBuf;

#[test]
fn test_full_command_line() {
    let options = LaunchOptions::scan(&[
        "cl", "-t", "120", "-p", "0.1", "0.2", "0.9", "0.2", "0.9", "0.8", "0.1", "0.8", "-o",
        "/tmp/out", "012345678912",
    ]);

    assert_eq!(options.pipeline, Some(PipelineKind::OpenCl));
    assert_eq!(options.threshold, Some(120.0));
    assert_eq!(
        options.corners,
        Some(CornerFractions([0.1, 0.2, 0.9, 0.2, 0.9, 0.8, 0.1, 0.8]))
    );
    assert_eq!(options.output_dir, Some(PathBuf::from("/tmp/out")));
    assert_eq!(options.serial.as_deref(), Some("012345678912"));
    assert!(options.ignored.is_empty());
}

#[test]
fn test_order_independent() {
    let a = LaunchOptions::scan(&["-o", "frames", "gl", "-t", "3"]);
    let b = LaunchOptions::scan(&["-t", "3", "gl", "-o", "frames"]);
    assert_eq!(a, b);
}

#[test]
fn test_first_pipeline_wins() {
    let options = LaunchOptions::scan(&["gl", "cpu", "cl"]);
    assert_eq!(options.pipeline, Some(PipelineKind::OpenGl));
}

#[test]
fn test_negative_threshold() {
    let options = LaunchOptions::scan(&["-t", "-5"]);
    assert_eq!(options.threshold, Some(-5.0));
}

#[test]
fn test_malformed_threshold_keeps_default() {
    let options = LaunchOptions::scan(&["-t", "bright", "cpu"]);
    assert_eq!(options.threshold, None);
    // The bad value is consumed, the next token still counts
    assert_eq!(options.pipeline, Some(PipelineKind::Cpu));
}

#[test]
fn test_missing_values_do_not_panic() {
    let options = LaunchOptions::scan(&["-t"]);
    assert_eq!(options.threshold, None);

    let options = LaunchOptions::scan(&["-o"]);
    assert_eq!(options.output_dir, None);

    let options = LaunchOptions::scan(&["-p", "0.1", "0.2", "0.3"]);
    assert_eq!(options.corners, None);
}

#[test]
fn test_malformed_corner_disables_rectification() {
    let options = LaunchOptions::scan(&[
        "-p", "0.1", "0.2", "0.9", "x", "0.9", "0.8", "0.1", "0.8", "gl",
    ]);
    assert_eq!(options.corners, None);
    assert_eq!(options.pipeline, Some(PipelineKind::OpenGl));
}

#[test]
fn test_unknown_tokens_ignored() {
    let options = LaunchOptions::scan(&["-x", "opengl", "12ab", "cpu"]);
    assert_eq!(options.ignored, vec!["-x", "opengl", "12ab"]);
    assert_eq!(options.pipeline, Some(PipelineKind::Cpu));
    assert_eq!(options.serial, None);
}

#[test]
fn test_last_serial_wins() {
    let options = LaunchOptions::scan(&["111", "222"]);
    assert_eq!(options.serial.as_deref(), Some("222"));
}

#[test]
fn test_long_options_after_launch_tokens() {
    let options = LaunchOptions::scan(&["cpu", "--headless", "-t", "10", "--frames", "3"]);
    assert!(options.headless);
    assert_eq!(options.frames, Some(3));
    assert_eq!(options.threshold, Some(10.0));
    assert!(options.ignored.is_empty());

    let options = LaunchOptions::scan(&["gl", "--frames", "many"]);
    assert_eq!(options.frames, None);
    assert!(!options.headless);
}

#[test]
fn test_no_device_is_unavailable() {
    let backend = SyntheticBackend::with_serials(&[]);
    let result = resolve_serial(&backend, None);
    assert_eq!(result, Err(SensorError::NoDeviceFound));

    let err = AppError::from(result.unwrap_err());
    assert!(err.is_device_unavailable());
}

#[test]
fn test_default_device_is_first_found() {
    let backend = SyntheticBackend::new();
    assert_eq!(resolve_serial(&backend, None).unwrap(), SYNTHETIC_SERIAL);
    assert_eq!(
        resolve_serial(&backend, Some("123456789012")).unwrap(),
        "123456789012"
    );
}
