//! Integer coordinate polygons.

use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;
use crate::contains::{Containment, Contains};
use crate::point::Point;
use crate::rect::Rect;
use crate::transform::{TransformMut, Transformation, TranslateMut};

/// A polygon with an exterior ring and optional interior rings (holes).
///
/// Rings are stored without repeating the first vertex.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Polygon {
    /// Vertices of the exterior ring.
    points: Vec<Point>,
    /// Vertices of each interior ring.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    interiors: Vec<Vec<Point>>,
}

impl Polygon {
    /// Creates a polygon with given vertices.
    ///
    /// A trailing vertex equal to the first is dropped.
    pub fn from_verts(mut vec: Vec<Point>) -> Self {
        close_ring(&mut vec);
        Self {
            points: vec,
            interiors: Vec::new(),
        }
    }

    /// Returns this polygon with the given interior rings added.
    pub fn with_interiors(mut self, interiors: Vec<Vec<Point>>) -> Self {
        for mut ring in interiors {
            close_ring(&mut ring);
            if !ring.is_empty() {
                self.interiors.push(ring);
            }
        }
        self
    }

    /// Returns the bottom y-coordinate in the polygon, or [`None`] if it has no vertices.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let points = vec![
    ///     Point { x: 0, y: 0 },
    ///     Point { x: 1, y: 2 },
    ///     Point { x: -4, y: 5 },
    /// ];
    /// let polygon = Polygon::from_verts(points);
    /// assert_eq!(polygon.bot(), Some(0));
    /// ```
    pub fn bot(&self) -> Option<i64> {
        self.points.iter().map(|point| point.y).min()
    }

    /// Returns the top y-coordinate in the polygon.
    pub fn top(&self) -> Option<i64> {
        self.points.iter().map(|point| point.y).max()
    }

    /// Returns the leftmost x-coordinate in the polygon.
    pub fn left(&self) -> Option<i64> {
        self.points.iter().map(|point| point.x).min()
    }

    /// Returns the rightmost x-coordinate in the polygon.
    pub fn right(&self) -> Option<i64> {
        self.points.iter().map(|point| point.x).max()
    }

    /// Returns the vertices of the exterior ring.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Returns the interior rings.
    pub fn interiors(&self) -> &[Vec<Point>] {
        &self.interiors
    }

    /// Returns true if the polygon has no vertices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates over the edges of every ring as `(start, end)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        std::iter::once(&self.points)
            .chain(self.interiors.iter())
            .flat_map(|ring| ring_edges(ring))
    }

    /// Twice the signed area of the exterior ring.
    ///
    /// Positive for counterclockwise rings.
    pub fn signed_area2(&self) -> i128 {
        ring_edges(&self.points)
            .map(|(a, b)| a.x as i128 * b.y as i128 - b.x as i128 * a.y as i128)
            .sum()
    }

    /// Returns the equivalent [`Rect`] if this polygon is an axis-aligned
    /// rectangle without holes.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let square = Polygon::from_verts(vec![
    ///     Point::new(0, 0),
    ///     Point::new(10, 0),
    ///     Point::new(10, 10),
    ///     Point::new(0, 10),
    /// ]);
    /// assert_eq!(square.as_rect(), Some(Rect::from_sides(0, 0, 10, 10)));
    /// ```
    pub fn as_rect(&self) -> Option<Rect> {
        if self.points.len() != 4 || !self.interiors.is_empty() {
            return None;
        }
        let axis_aligned = ring_edges(&self.points).all(|(a, b)| a.x == b.x || a.y == b.y);
        let bbox = self.bbox()?;
        if axis_aligned && bbox.area() != 0 {
            Some(bbox)
        } else {
            None
        }
    }
}

fn close_ring(ring: &mut Vec<Point>) {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
}

fn ring_edges(ring: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = ring.len();
    (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
}

/// Ray casting with boundary detection for a single ring.
fn ring_contains(ring: &[Point], p: Point) -> Containment {
    let mut inside = false;
    for (a, b) in ring_edges(ring) {
        if crate::touch::on_segment(p, a, b) {
            return Containment::Partial;
        }
        if (a.y > p.y) != (b.y > p.y) {
            // x-coordinate of the edge at height p.y, compared without division.
            let lhs = (p.x - a.x) as i128 * (b.y - a.y) as i128;
            let rhs = (b.x - a.x) as i128 * (p.y - a.y) as i128;
            let crosses = if b.y > a.y { lhs < rhs } else { lhs > rhs };
            if crosses {
                inside = !inside;
            }
        }
    }
    if inside {
        Containment::Full
    } else {
        Containment::None
    }
}

impl Bbox for Polygon {
    fn bbox(&self) -> Option<Rect> {
        Rect::from_sides_option(self.left()?, self.bot()?, self.right()?, self.top()?)
    }
}

impl TranslateMut for Polygon {
    fn translate_mut(&mut self, p: Point) {
        self.points.translate_mut(p);
        self.interiors.translate_mut(p);
    }
}

impl TransformMut for Polygon {
    fn transform_mut(&mut self, trans: Transformation) {
        self.points.transform_mut(trans);
        self.interiors.transform_mut(trans);
    }
}

impl Contains<Point> for Polygon {
    /// Determines if a point is contained within a polygon.
    ///
    /// Points on a boundary are reported as [`Containment::Partial`].
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let polygon = Polygon::from_verts(vec![
    ///     Point::new(0, 0),
    ///     Point::new(10, 0),
    ///     Point::new(10, 10),
    ///     Point::new(0, 10),
    /// ])
    /// .with_interiors(vec![vec![
    ///     Point::new(4, 4),
    ///     Point::new(6, 4),
    ///     Point::new(6, 6),
    ///     Point::new(4, 6),
    /// ]]);
    /// assert_eq!(polygon.contains(&Point::new(2, 2)), Containment::Full);
    /// assert_eq!(polygon.contains(&Point::new(5, 5)), Containment::None);
    /// assert_eq!(polygon.contains(&Point::new(10, 5)), Containment::Partial);
    /// assert_eq!(polygon.contains(&Point::new(20, 5)), Containment::None);
    /// ```
    fn contains(&self, p: &Point) -> Containment {
        match ring_contains(&self.points, *p) {
            Containment::Full => {}
            other => return other,
        }
        for hole in self.interiors.iter() {
            match ring_contains(hole, *p) {
                Containment::None => {}
                Containment::Partial => return Containment::Partial,
                Containment::Full => return Containment::None,
            }
        }
        Containment::Full
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn closing_vertex_is_dropped() {
        let p = Polygon::from_verts(vec![
            Point::new(0, 0),
            Point::new(4, 0),
            Point::new(0, 3),
            Point::new(0, 0),
        ]);
        assert_eq!(p.points().len(), 3);
        assert_eq!(p.signed_area2(), 12);
    }

    #[test]
    fn triangle_is_not_a_rect() {
        let p = Polygon::from_verts(vec![Point::new(0, 0), Point::new(4, 0), Point::new(0, 3)]);
        assert_eq!(p.as_rect(), None);
        assert_eq!(p.bbox(), Some(Rect::from_sides(0, 0, 4, 3)));
    }

    #[test]
    fn rotated_square_is_not_a_rect() {
        let p = Rect::from_sides(0, 0, 10, 10)
            .to_polygon()
            .transform(Transformation::rotate(45.));
        assert_eq!(p.as_rect(), None);
    }
}
