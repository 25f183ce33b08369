// SPDX-License-Identifier: GPL-3.0-only

//! Inverse-mapping perspective warp with bilinear sampling

use image::{ImageBuffer, Pixel};

use super::homography::Homography;

/// Source coordinates this close to an integer are treated as that integer
const SNAP_EPSILON: f64 = 1e-6;

/// Resample `source` into a `width` x `height` image
///
/// `dst_to_src` maps output pixel coordinates to source coordinates. Source
/// positions outside the image read as zero in every channel.
pub fn warp_perspective<P>(
    source: &ImageBuffer<P, Vec<u8>>,
    dst_to_src: &Homography,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let mut output: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(width, height);

    for (x, y, pixel) in output.enumerate_pixels_mut() {
        if let Some((sx, sy)) = dst_to_src.map_f64(f64::from(x), f64::from(y)) {
            sample_bilinear(source, snap(sx), snap(sy), pixel.channels_mut());
        }
    }

    output
}

fn snap(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < SNAP_EPSILON {
        nearest
    } else {
        value
    }
}

/// Bilinear sample at (x, y) with a zero border, written into `out`
fn sample_bilinear<P>(source: &ImageBuffer<P, Vec<u8>>, x: f64, y: f64, out: &mut [u8])
where
    P: Pixel<Subpixel = u8>,
{
    if !x.is_finite() || !y.is_finite() {
        return;
    }
    let (width, height) = (i64::from(source.width()), i64::from(source.height()));

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    // Far outside the image all four taps are border
    if x0 < -1.0 || y0 < -1.0 || x0 >= width as f64 || y0 >= height as f64 {
        return;
    }
    let (x0, y0) = (x0 as i64, y0 as i64);

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    for (channel, value) in out.iter_mut().enumerate() {
        let mut acc = 0.0f64;
        for &(tx, ty, weight) in &taps {
            if weight == 0.0 || tx < 0 || ty < 0 || tx >= width || ty >= height {
                continue;
            }
            let sample = source.get_pixel(tx as u32, ty as u32).channels()[channel];
            acc += weight * f64::from(sample);
        }
        *value = acc.round().clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::rectify::geometry::Point2D;
    use image::{GrayImage, Luma};

    fn identity() -> Homography {
        let square = [
            Point2D::new(0.0, 0.0),
            Point2D::new(1.0, 0.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(0.0, 1.0),
        ];
        Homography::from_correspondences(&square, &square).unwrap()
    }

    fn shift(dx: f32, dy: f32) -> Homography {
        let dst = [
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(0.0, 10.0),
        ];
        let src = dst.map(|p| Point2D::new(p.x + dx, p.y + dy));
        // dst -> src mapping
        Homography::from_correspondences(&dst, &src).unwrap()
    }

    #[test]
    fn test_identity_reproduces_source() {
        let source = GrayImage::from_fn(7, 5, |x, y| Luma([(x * 30 + y * 7) as u8]));
        let out = warp_perspective(&source, &identity(), 7, 5);
        assert_eq!(out, source);
    }

    #[test]
    fn test_half_pixel_interpolates() {
        let source = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 100 } else { 200 }]));
        let out = warp_perspective(&source, &shift(0.5, 0.0), 1, 1);
        assert_eq!(out.get_pixel(0, 0).0[0], 150);
    }

    #[test]
    fn test_outside_reads_zero() {
        let source = GrayImage::from_pixel(4, 4, Luma([200]));
        let out = warp_perspective(&source, &shift(-2.0, 0.0), 4, 4);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 0);
        assert_eq!(out.get_pixel(2, 0).0[0], 200);
        assert_eq!(out.get_pixel(3, 3).0[0], 200);
    }

    #[test]
    fn test_edge_blends_with_border() {
        let source = GrayImage::from_pixel(4, 4, Luma([200]));
        let out = warp_perspective(&source, &shift(3.5, 0.0), 1, 1);
        assert_eq!(out.get_pixel(0, 0).0[0], 100);
    }

    #[test]
    fn test_rgb_channels_independent() {
        let source = image::RgbImage::from_pixel(3, 3, image::Rgb([10, 20, 30]));
        let out = warp_perspective(&source, &identity(), 3, 3);
        assert_eq!(out.get_pixel(1, 1).0, [10, 20, 30]);
    }

    #[test]
    fn test_snap() {
        assert_eq!(snap(2.0000000001), 2.0);
        assert_eq!(snap(-0.0000000001), 0.0);
        assert_eq!(snap(2.25), 2.25);
    }
}
