//! Zero-distance tests between shapes.
//!
//! Two shapes touch when their closed regions share at least one point.
//! This is the connectivity rule used to group metal into nets.

use crate::bbox::Bbox;
use crate::contains::Contains;
use crate::point::Point;
use crate::polygon::Polygon;

/// Orientation of the triple `(a, b, c)`: positive when counterclockwise.
fn orient(a: Point, b: Point, c: Point) -> i128 {
    (b.x - a.x) as i128 * (c.y - a.y) as i128 - (b.y - a.y) as i128 * (c.x - a.x) as i128
}

/// Returns true if `p` lies on the closed segment `ab`.
pub(crate) fn on_segment(p: Point, a: Point, b: Point) -> bool {
    orient(a, b, p) == 0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

/// Returns true if the closed segments `ab` and `cd` share a point.
///
/// # Example
///
/// ```
/// # use geometry::prelude::*;
/// use geometry::touch::segments_intersect;
/// let (a, b) = (Point::new(0, 0), Point::new(10, 10));
/// assert!(segments_intersect(a, b, Point::new(0, 10), Point::new(10, 0)));
/// assert!(segments_intersect(a, b, Point::new(10, 10), Point::new(20, 0)));
/// assert!(!segments_intersect(a, b, Point::new(1, 0), Point::new(11, 10)));
/// ```
pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let (d1, d2) = (orient(c, d, a), orient(c, d, b));
    let (d3, d4) = (orient(a, b, c), orient(a, b, d));
    if ((d1 > 0 && d2 < 0) || (d1 < 0 && d2 > 0)) && ((d3 > 0 && d4 < 0) || (d3 < 0 && d4 > 0))
    {
        return true;
    }
    on_segment(a, c, d) || on_segment(b, c, d) || on_segment(c, a, b) || on_segment(d, a, b)
}

/// Shapes that can report whether they share a point with another shape.
pub trait Touches<T: ?Sized = Self> {
    /// Returns true if the two closed shapes share at least one point.
    fn touches(&self, other: &T) -> bool;
}

impl Touches for Polygon {
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let a = Rect::from_sides(0, 0, 10, 10).to_polygon();
    /// let b = Rect::from_sides(10, 0, 20, 10).to_polygon();
    /// let c = Rect::from_sides(11, 0, 20, 10).to_polygon();
    /// assert!(a.touches(&b));
    /// assert!(!a.touches(&c));
    /// ```
    fn touches(&self, other: &Polygon) -> bool {
        match (self.bbox(), other.bbox()) {
            (Some(a), Some(b)) if a.intersection(b).is_some() => {}
            _ => return false,
        }
        for (a, b) in self.edges() {
            for (c, d) in other.edges() {
                if segments_intersect(a, b, c, d) {
                    return true;
                }
            }
        }
        // No edges cross: either disjoint or one lies inside the other.
        let inside = |outer: &Polygon, inner: &Polygon| {
            inner
                .points()
                .first()
                .map(|p| !outer.contains(p).is_none())
                .unwrap_or(false)
        };
        inside(self, other) || inside(other, self)
    }
}

impl Touches for [Polygon] {
    fn touches(&self, other: &[Polygon]) -> bool {
        self.iter().any(|a| other.iter().any(|b| a.touches(b)))
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn nested_polygons_touch() {
        let outer = Rect::from_sides(0, 0, 100, 100).to_polygon();
        let inner = Rect::from_sides(40, 40, 60, 60).to_polygon();
        assert!(outer.touches(&inner));
        assert!(inner.touches(&outer));
    }

    #[test]
    fn polygon_in_hole_does_not_touch() {
        let donut = Rect::from_sides(0, 0, 100, 100)
            .to_polygon()
            .with_interiors(vec![Rect::from_sides(20, 20, 80, 80).corners().to_vec()]);
        let island = Rect::from_sides(40, 40, 60, 60).to_polygon();
        assert!(!donut.touches(&island));
    }

    #[test]
    fn path_segments_touch_pad() {
        let pad = Rect::from_sides(0, -50, 100, 50).to_polygon();
        let trace = Path::new(vec![Point::new(100, 0), Point::new(500, 0)], 10);
        assert!(trace.segment_polygons().as_slice().touches(std::slice::from_ref(&pad)));
        let far = Path::new(vec![Point::new(200, 0), Point::new(500, 0)], 10);
        assert!(!far.segment_polygons().as_slice().touches(std::slice::from_ref(&pad)));
    }
}
