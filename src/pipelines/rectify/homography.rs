// SPDX-License-Identifier: GPL-3.0-only

//! Projective transform from four point correspondences

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use super::geometry::Point2D;
use crate::errors::RectifyError;

/// Twice the triangle area below which three points count as collinear,
/// relative to the squared extent of the point set
const COLLINEAR_TOLERANCE: f64 = 1e-9;

/// Largest accepted corner reprojection error, relative to `1 + extent`
const RESIDUAL_TOLERANCE: f64 = 1e-6;

/// Homogeneous weights closer to zero than this map to infinity
const MIN_HOMOGENEOUS_W: f64 = 1e-12;

/// A 3x3 projective transform with `h[2][2] == 1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// The transform sending each `src[i]` exactly onto `dst[i]`
    ///
    /// Fails with [`RectifyError::DegenerateGeometry`] if either point set
    /// has three collinear (or two coincident) points, the system is
    /// singular, or the solution does not reproduce the correspondences.
    pub fn from_correspondences(
        src: &[Point2D; 4],
        dst: &[Point2D; 4],
    ) -> Result<Self, RectifyError> {
        if !src.iter().chain(dst).all(Point2D::is_finite) {
            return Err(RectifyError::DegenerateGeometry);
        }
        if has_collinear_triple(src) || has_collinear_triple(dst) {
            return Err(RectifyError::DegenerateGeometry);
        }

        // Rows 2i and 2i+1 hold the x' and y' equations for correspondence i,
        // unknowns ordered h00 h01 h02 h10 h11 h12 h20 h21.
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for (i, (s, d)) in src.iter().zip(dst).enumerate() {
            let (x, y) = (f64::from(s.x), f64::from(s.y));
            let (u, v) = (f64::from(d.x), f64::from(d.y));

            let r = i * 2;
            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -x * u;
            a[(r, 7)] = -y * u;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -x * v;
            a[(r + 1, 7)] = -y * v;
            b[r + 1] = v;
        }

        let h = a.lu().solve(&b).ok_or(RectifyError::DegenerateGeometry)?;
        if h.iter().any(|value| !value.is_finite()) {
            return Err(RectifyError::DegenerateGeometry);
        }

        let homography = Self {
            matrix: Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0),
        };
        homography.check_residual(src, dst)?;
        Ok(homography)
    }

    /// The inverse transform
    pub fn inverse(&self) -> Result<Self, RectifyError> {
        let inverse = self
            .matrix
            .try_inverse()
            .ok_or(RectifyError::DegenerateGeometry)?;
        if inverse.iter().any(|value| !value.is_finite()) {
            return Err(RectifyError::DegenerateGeometry);
        }
        Ok(Self { matrix: inverse })
    }

    /// Map a point; `None` where it lands at infinity
    pub fn map(&self, point: Point2D) -> Option<Point2D> {
        let (x, y) = self.map_f64(f64::from(point.x), f64::from(point.y))?;
        Some(Point2D::new(x as f32, y as f32))
    }

    /// Map a point at full precision
    pub fn map_f64(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let p = self.matrix * Vector3::new(x, y, 1.0);
        if p.z.abs() < MIN_HOMOGENEOUS_W {
            return None;
        }
        Some((p.x / p.z, p.y / p.z))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    fn check_residual(&self, src: &[Point2D; 4], dst: &[Point2D; 4]) -> Result<(), RectifyError> {
        let tolerance = RESIDUAL_TOLERANCE * (1.0 + extent(dst));
        for (s, d) in src.iter().zip(dst) {
            let (x, y) = self
                .map_f64(f64::from(s.x), f64::from(s.y))
                .ok_or(RectifyError::DegenerateGeometry)?;
            let error = (x - f64::from(d.x)).hypot(y - f64::from(d.y));
            if error.is_nan() || error > tolerance {
                return Err(RectifyError::DegenerateGeometry);
            }
        }
        Ok(())
    }
}

/// Largest coordinate span of the point set
fn extent(points: &[Point2D; 4]) -> f64 {
    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(f64::from(p.x));
        max_x = max_x.max(f64::from(p.x));
        min_y = min_y.min(f64::from(p.y));
        max_y = max_y.max(f64::from(p.y));
    }
    (max_x - min_x).max(max_y - min_y)
}

fn has_collinear_triple(points: &[Point2D; 4]) -> bool {
    let scale = extent(points);
    if scale <= 0.0 {
        return true;
    }
    let tolerance = COLLINEAR_TOLERANCE * scale * scale;

    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    TRIPLES.iter().any(|&(i, j, k)| {
        let (a, b, c) = (points[i], points[j], points[k]);
        let abx = f64::from(b.x) - f64::from(a.x);
        let aby = f64::from(b.y) - f64::from(a.y);
        let acx = f64::from(c.x) - f64::from(a.x);
        let acy = f64::from(c.y) - f64::from(a.y);
        (abx * acy - aby * acx).abs() <= tolerance
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use quickcheck_macros::quickcheck;

    fn pts(points: [(f32, f32); 4]) -> [Point2D; 4] {
        points.map(Point2D::from)
    }

    #[test]
    fn test_identity() {
        let square = pts([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let h = Homography::from_correspondences(&square, &square).unwrap();
        assert_relative_eq!(*h.matrix(), Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn test_translation() {
        let src = pts([(10.0, 10.0), (89.0, 10.0), (89.0, 89.0), (10.0, 89.0)]);
        let dst = pts([(0.0, 0.0), (79.0, 0.0), (79.0, 79.0), (0.0, 79.0)]);
        let h = Homography::from_correspondences(&src, &dst).unwrap();
        let p = h.map(Point2D::new(50.0, 20.0)).unwrap();
        assert_relative_eq!(p.x, 40.0, epsilon = 1e-4);
        assert_relative_eq!(p.y, 10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_inverse_round_trip() {
        let src = pts([(30.0, 0.0), (70.0, 0.0), (90.0, 50.0), (10.0, 50.0)]);
        let dst = pts([(0.0, 0.0), (79.0, 0.0), (79.0, 49.0), (0.0, 49.0)]);
        let h = Homography::from_correspondences(&src, &dst).unwrap();
        let inv = h.inverse().unwrap();
        for (s, d) in src.iter().zip(&dst) {
            let back = inv.map(*d).unwrap();
            assert_relative_eq!(back.x, s.x, epsilon = 1e-3);
            assert_relative_eq!(back.y, s.y, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_collinear_rejected() {
        let src = pts([(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (0.0, 10.0)]);
        let dst = pts([(0.0, 0.0), (9.0, 0.0), (9.0, 9.0), (0.0, 9.0)]);
        assert_eq!(
            Homography::from_correspondences(&src, &dst),
            Err(RectifyError::DegenerateGeometry)
        );
    }

    #[test]
    fn test_coincident_rejected() {
        let src = pts([(5.0, 5.0), (5.0, 5.0), (10.0, 10.0), (0.0, 10.0)]);
        let dst = pts([(0.0, 0.0), (9.0, 0.0), (9.0, 9.0), (0.0, 9.0)]);
        assert!(Homography::from_correspondences(&src, &dst).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let src = pts([(0.0, 0.0), (f32::INFINITY, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let dst = pts([(0.0, 0.0), (9.0, 0.0), (9.0, 9.0), (0.0, 9.0)]);
        assert!(Homography::from_correspondences(&src, &dst).is_err());
    }

    #[quickcheck]
    fn prop_corners_map_exactly(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8, g: u8, h: u8) -> bool {
        // Jittered square: always convex, never degenerate
        let j = |v: u8| f32::from(v % 20);
        let src = pts([
            (j(a), j(b)),
            (60.0 + j(c), j(d)),
            (60.0 + j(e), 60.0 + j(f)),
            (j(g), 60.0 + j(h)),
        ]);
        let dst = pts([(0.0, 0.0), (63.0, 0.0), (63.0, 47.0), (0.0, 47.0)]);

        let Ok(homography) = Homography::from_correspondences(&src, &dst) else {
            return false;
        };
        src.iter().zip(&dst).all(|(s, d)| {
            homography
                .map(*s)
                .is_some_and(|p| (p.x - d.x).abs() < 1e-3 && (p.y - d.y).abs() < 1e-3)
        })
    }
}
