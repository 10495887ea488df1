//! Paths: polylines with a width.
//!
//! A path is the centerline of a trace such as a coplanar waveguide.
//! Bounding boxes are computed from the centerline alone, since simulator
//! backends sweep the width along the line themselves.

use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;
use crate::point::Point;
use crate::polygon::Polygon;
use crate::rect::Rect;
use crate::transform::{TransformMut, Transformation, TranslateMut};

/// A polyline centerline with a uniform width.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Path {
    points: Vec<Point>,
    width: i64,
}

impl Path {
    /// Creates a new path.
    pub fn new(points: Vec<Point>, width: i64) -> Self {
        Self {
            points,
            width: width.abs(),
        }
    }

    /// The vertices of the centerline.
    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The width of the path.
    #[inline]
    pub fn width(&self) -> i64 {
        self.width
    }

    /// Returns the same centerline with a different width.
    pub fn with_width(&self, width: i64) -> Self {
        Self::new(self.points.clone(), width)
    }

    /// The total length of the centerline.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let path = Path::new(vec![Point::new(0, 0), Point::new(30, 0), Point::new(30, 40)], 5);
    /// assert_eq!(path.length(), 70.);
    /// ```
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// The first and last vertices of the centerline.
    pub fn endpoints(&self) -> Option<(Point, Point)> {
        Some((*self.points.first()?, *self.points.last()?))
    }

    /// Approximates the outline of the path as one quadrilateral per segment.
    ///
    /// Zero-length segments are skipped. A zero-width path yields degenerate
    /// quadrilaterals that still carry the centerline for touch tests.
    pub fn segment_polygons(&self) -> Vec<Polygon> {
        let half = self.width as f64 / 2.;
        self.points
            .windows(2)
            .filter_map(|w| {
                let (a, b) = (w[0], w[1]);
                let n = (b - a).to_vec2().unit()?.rot90() * half;
                Some(Polygon::from_verts(vec![
                    a.offset(-n),
                    b.offset(-n),
                    b.offset(n),
                    a.offset(n),
                ]))
            })
            .collect()
    }
}

impl Bbox for Path {
    fn bbox(&self) -> Option<Rect> {
        let xs = self.points.iter().map(|p| p.x);
        let ys = self.points.iter().map(|p| p.y);
        Rect::from_sides_option(xs.clone().min()?, ys.clone().min()?, xs.max()?, ys.max()?)
    }
}

impl TranslateMut for Path {
    fn translate_mut(&mut self, p: Point) {
        self.points.translate_mut(p);
    }
}

impl TransformMut for Path {
    fn transform_mut(&mut self, trans: Transformation) {
        self.points.transform_mut(trans);
    }
}
