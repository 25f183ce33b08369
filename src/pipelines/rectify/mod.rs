// SPDX-License-Identifier: GPL-3.0-only

//! Four-point perspective rectification
//!
//! Given an image and the corners of a quadrilateral region in it, produce an
//! upright rectangular image of that region.
//!
//! ```text
//!   tl ──────── tr              (0,0) ─────── (W-1,0)
//!    \          \                 │              │
//!     \          \      ──▶       │              │
//!      bl ──────── br          (0,H-1) ───── (W-1,H-1)
//! ```
//!
//! The output width is the longer of the top and bottom edges and the height
//! the longer of the left and right edges, truncated to whole pixels. When
//! two opposite edges are exactly equal the top (width) or left (height)
//! edge is used. The homography sending the corners onto the output
//! rectangle is solved exactly from the four correspondences, and every
//! output pixel is sampled bilinearly through its inverse.
//!
//! Rectification is a pure function: the source is only read and a new
//! image is returned.

pub mod geometry;
pub mod homography;
pub mod warp;

pub use geometry::{CornerFractions, Edge, EdgeLengths, OutputSize, Point2D, Quad};
pub use homography::Homography;

use image::{ImageBuffer, Pixel};
use tracing::trace;

use crate::constants::MAX_RECTIFIED_SIDE;
use crate::errors::RectifyError;

/// Rectify the region bounded by the four corners
pub fn rectify<P>(
    source: &ImageBuffer<P, Vec<u8>>,
    top_left: Point2D,
    top_right: Point2D,
    bottom_right: Point2D,
    bottom_left: Point2D,
) -> Result<ImageBuffer<P, Vec<u8>>, RectifyError>
where
    P: Pixel<Subpixel = u8>,
{
    rectify_quad(
        source,
        &Quad::new(top_left, top_right, bottom_right, bottom_left),
    )
}

/// Rectify the region bounded by `quad`
pub fn rectify_quad<P>(
    source: &ImageBuffer<P, Vec<u8>>,
    quad: &Quad,
) -> Result<ImageBuffer<P, Vec<u8>>, RectifyError>
where
    P: Pixel<Subpixel = u8>,
{
    if !quad.is_finite() {
        return Err(RectifyError::DegenerateGeometry);
    }

    let size = OutputSize::from_quad(quad);
    if size.is_empty() {
        return Err(RectifyError::DegenerateGeometry);
    }
    if size.width > MAX_RECTIFIED_SIDE || size.height > MAX_RECTIFIED_SIDE {
        return Err(RectifyError::OutputTooLarge {
            width: size.width,
            height: size.height,
        });
    }

    let forward = Homography::from_correspondences(&quad.corners(), &size.corners())?;
    let inverse = forward.inverse()?;

    trace!(
        width = size.width,
        height = size.height,
        "Rectifying quadrilateral"
    );

    Ok(warp::warp_perspective(
        source,
        &inverse,
        size.width,
        size.height,
    ))
}
