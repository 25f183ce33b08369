// SPDX-License-Identifier: GPL-3.0-only

//! Points, quadrilaterals and output size derivation

/// A point in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`
    ///
    /// Coordinate differences are taken in `f32`, the squared sum and root in
    /// `f64`, and the result narrowed back to `f32`.
    pub fn distance(&self, other: &Point2D) -> f32 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt() as f32
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f32, f32)> for Point2D {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Four corners of a region to rectify
///
/// Winding and convexity are not checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub top_left: Point2D,
    pub top_right: Point2D,
    pub bottom_right: Point2D,
    pub bottom_left: Point2D,
}

impl Quad {
    pub fn new(
        top_left: Point2D,
        top_right: Point2D,
        bottom_right: Point2D,
        bottom_left: Point2D,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Corners in (tl, tr, br, bl) order
    pub fn corners(&self) -> [Point2D; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.corners().iter().all(Point2D::is_finite)
    }
}

/// Corner positions as fractions of an image's extent
///
/// Values are `tl.x tl.y tr.x tr.y br.x br.y bl.x bl.y`, scaled by
/// `(width - 1, height - 1)` of the image they are resolved against.
/// Nothing is clamped, so fractions outside `0..=1` place corners off-image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerFractions(pub [f32; 8]);

impl CornerFractions {
    /// Parse eight values; `None` unless exactly eight finite floats are given
    pub fn parse<S: AsRef<str>>(values: &[S]) -> Option<Self> {
        if values.len() != 8 {
            return None;
        }
        let mut out = [0.0f32; 8];
        for (slot, value) in out.iter_mut().zip(values) {
            let parsed: f32 = value.as_ref().trim().parse().ok()?;
            if !parsed.is_finite() {
                return None;
            }
            *slot = parsed;
        }
        Some(Self(out))
    }

    /// Pixel corners for an image of `width` x `height`
    pub fn resolve(&self, width: u32, height: u32) -> Quad {
        let sx = width.saturating_sub(1) as f32;
        let sy = height.saturating_sub(1) as f32;
        let f = &self.0;
        Quad::new(
            Point2D::new(f[0] * sx, f[1] * sy),
            Point2D::new(f[2] * sx, f[3] * sy),
            Point2D::new(f[4] * sx, f[5] * sy),
            Point2D::new(f[6] * sx, f[7] * sy),
        )
    }
}

/// Which of two opposite edges determined an output dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// bottom edge (width) or right edge (height)
    A,
    /// top edge (width) or left edge (height)
    B,
}

/// Edge lengths of a quad and the edge chosen for each output dimension
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeLengths {
    /// |br - bl|
    pub width_a: f32,
    /// |tr - tl|
    pub width_b: f32,
    /// |tr - br|
    pub height_a: f32,
    /// |tl - bl|
    pub height_b: f32,
}

impl EdgeLengths {
    pub fn of(quad: &Quad) -> Self {
        Self {
            width_a: quad.bottom_right.distance(&quad.bottom_left),
            width_b: quad.top_right.distance(&quad.top_left),
            height_a: quad.top_right.distance(&quad.bottom_right),
            height_b: quad.top_left.distance(&quad.bottom_left),
        }
    }

    /// A only when strictly longer; ties go to B
    pub fn width_edge(&self) -> Edge {
        if self.width_a > self.width_b { Edge::A } else { Edge::B }
    }

    pub fn height_edge(&self) -> Edge {
        if self.height_a > self.height_b { Edge::A } else { Edge::B }
    }

    pub fn width(&self) -> f32 {
        match self.width_edge() {
            Edge::A => self.width_a,
            Edge::B => self.width_b,
        }
    }

    pub fn height(&self) -> f32 {
        match self.height_edge() {
            Edge::A => self.height_a,
            Edge::B => self.height_b,
        }
    }
}

/// Dimensions of a rectified image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
}

impl OutputSize {
    /// Size derived from the longer of each pair of opposite edges, truncated
    ///
    /// Non-finite or negative lengths saturate to 0 (and `u32::MAX` for +inf);
    /// the rectifier rejects both.
    pub fn from_quad(quad: &Quad) -> Self {
        let edges = EdgeLengths::of(quad);
        Self {
            width: edges.width() as u32,
            height: edges.height() as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Destination corners (0,0), (W-1,0), (W-1,H-1), (0,H-1)
    pub fn corners(&self) -> [Point2D; 4] {
        let right = self.width.saturating_sub(1) as f32;
        let bottom = self.height.saturating_sub(1) as f32;
        [
            Point2D::new(0.0, 0.0),
            Point2D::new(right, 0.0),
            Point2D::new(right, bottom),
            Point2D::new(0.0, bottom),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad(points: [(f32, f32); 4]) -> Quad {
        Quad::new(
            points[0].into(),
            points[1].into(),
            points[2].into(),
            points[3].into(),
        )
    }

    #[test]
    fn test_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert_relative_eq!(a.distance(&b), 5.0);
        assert_relative_eq!(b.distance(&a), 5.0);
    }

    #[test]
    fn test_axis_aligned_size() {
        let q = quad([(10.0, 10.0), (89.0, 10.0), (89.0, 89.0), (10.0, 89.0)]);
        assert_eq!(
            OutputSize::from_quad(&q),
            OutputSize {
                width: 79,
                height: 79
            }
        );
    }

    #[test]
    fn test_trapezoid_prefers_longer_edge() {
        // Top edge 40, bottom edge 80
        let q = quad([(30.0, 0.0), (70.0, 0.0), (90.0, 50.0), (10.0, 50.0)]);
        let edges = EdgeLengths::of(&q);
        assert_eq!(edges.width_edge(), Edge::A);
        assert_eq!(OutputSize::from_quad(&q).width, 80);
    }

    #[test]
    fn test_ties_pick_b() {
        let q = quad([(0.0, 0.0), (50.0, 0.0), (50.0, 20.0), (0.0, 20.0)]);
        let edges = EdgeLengths::of(&q);
        assert_eq!(edges.width_a, edges.width_b);
        assert_eq!(edges.width_edge(), Edge::B);
        assert_eq!(edges.height_edge(), Edge::B);
    }

    #[test]
    fn test_fractional_lengths_truncate() {
        let q = quad([(0.0, 0.0), (10.9, 0.0), (10.9, 5.5), (0.0, 5.5)]);
        let size = OutputSize::from_quad(&q);
        assert_eq!((size.width, size.height), (10, 5));
    }

    #[test]
    fn test_output_corners() {
        let size = OutputSize {
            width: 80,
            height: 60,
        };
        assert_eq!(
            size.corners(),
            [
                Point2D::new(0.0, 0.0),
                Point2D::new(79.0, 0.0),
                Point2D::new(79.0, 59.0),
                Point2D::new(0.0, 59.0),
            ]
        );
    }

    #[test]
    fn test_corner_fractions_resolve() {
        let fractions = CornerFractions([0.1, 0.1, 0.9, 0.1, 0.9, 0.9, 0.1, 0.9]);
        let q = fractions.resolve(101, 51);
        assert_relative_eq!(q.top_left.x, 10.0, epsilon = 1e-4);
        assert_relative_eq!(q.top_left.y, 5.0, epsilon = 1e-4);
        assert_relative_eq!(q.bottom_right.x, 90.0, epsilon = 1e-4);
        assert_relative_eq!(q.bottom_right.y, 45.0, epsilon = 1e-4);
    }

    #[test]
    fn test_corner_fractions_parse() {
        let good = ["0", "0", "1", "0", "1", "1", "0", "1"];
        assert!(CornerFractions::parse(&good).is_some());
        assert!(CornerFractions::parse(&good[..7]).is_none());

        let bad = ["0", "0", "1", "x", "1", "1", "0", "1"];
        assert!(CornerFractions::parse(&bad).is_none());

        let nan = ["0", "0", "1", "NaN", "1", "1", "0", "1"];
        assert!(CornerFractions::parse(&nan).is_none());
    }

    #[test]
    fn test_non_finite_quad() {
        let q = quad([(0.0, 0.0), (f32::NAN, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        assert!(!q.is_finite());
    }
}
