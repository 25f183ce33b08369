// SPDX-License-Identifier: MPL-2.0

//! depth-rectify - depth sensor capture with thresholding and perspective rectification
//!
//! Pulls synchronized color/IR/depth frame sets from a depth sensor, turns the
//! undistorted depth into an adjustable binary mask, optionally de-skews a
//! quadrilateral region of it into an upright rectangle, previews the result
//! and writes it into a ring of numbered PNG files.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Depth sensor backend abstraction (synthetic, freedepth)
//! - [`capture`]: The acquisition/display loop and cancellation
//! - [`pipelines`]: Thresholding and four-point perspective rectification
//! - [`preview`]: Terminal and headless preview windows
//! - [`storage`]: Rotating output slots
//! - [`config`]: User configuration handling
//! - [`cli`]: Lenient launch-token scanning and device listing
//!
//! # Example
//!
//! ```
//! use depth_rectify::pipelines::rectify::{Point2D, rectify};
//! use image::{GrayImage, Luma};
//!
//! let source = GrayImage::from_pixel(100, 100, Luma([200]));
//! let output = rectify(
//!     &source,
//!     Point2D::new(10.0, 10.0),
//!     Point2D::new(90.0, 10.0),
//!     Point2D::new(90.0, 90.0),
//!     Point2D::new(10.0, 90.0),
//! )
//! .unwrap();
//! assert_eq!(output.dimensions(), (80, 80));
//! ```

pub mod backends;
pub mod capture;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod preview;
pub mod storage;

// Re-export commonly used types
pub use capture::{CancelToken, CaptureSettings, LoopSummary, run_session};
pub use config::Config;
pub use constants::CleanupPolicy;
pub use errors::{AppError, AppResult};
pub use pipelines::rectify::{Point2D, Quad, rectify, rectify_quad};
