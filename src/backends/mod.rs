// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for depth sensors
//!
//! # Architecture
//!
//! The backend layer abstracts hardware access, providing a consistent API
//! regardless of where frames come from:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                Capture Loop                  │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │  Synthetic  │    │    freedepth     │   │
//! │  │ (generated) │    │  (Kinect, USB)   │   │
//! │  └─────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`sensor`]: Sensor traits, frame sets, and backend implementations

pub mod sensor;
