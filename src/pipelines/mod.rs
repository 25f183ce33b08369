// SPDX-License-Identifier: MPL-2.0

//! Per-frame image processing
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │  Undistorted │ ──▶ │  Threshold        │ ──▶ │  Rectify     │
//! │  depth (mm)  │     │  - mm → gray      │     │  (optional)  │
//! │              │     │  - binary mask    │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`threshold`]: depth to grayscale conversion and the adjustable mask
//! - [`rectify`]: four-point perspective rectification

pub mod rectify;
pub mod threshold;
