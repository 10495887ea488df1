//! Axis-aligned rectangles.

use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;
use crate::contains::{Containment, Contains};
use crate::dir::Dir;
use crate::point::Point;
use crate::polygon::Polygon;
use crate::transform::{TransformMut, Transformation, TranslateMut};
use crate::union::BoundingUnion;

/// An axis-aligned rectangle, specified by lower-left and upper-right corners.
#[derive(
    Debug, Default, Copy, Clone, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Rect {
    /// The lower-left corner.
    p0: Point,
    /// The upper-right corner.
    p1: Point,
}

impl Rect {
    /// Creates a rectangle with the given lower-left and upper-right corners.
    ///
    /// # Panics
    ///
    /// Panics if the lower-left corner is not below and to the left of the
    /// upper-right corner. Use [`Rect::from_corners_option`] for unchecked data.
    #[inline]
    pub fn new(lower_left: Point, upper_right: Point) -> Self {
        assert!(lower_left.x <= upper_right.x);
        assert!(lower_left.y <= upper_right.y);
        Self {
            p0: lower_left,
            p1: upper_right,
        }
    }

    /// Creates a rectangle from all 4 sides (left, bottom, right, top).
    ///
    /// # Panics
    ///
    /// Panics if `left > right` or `bot > top`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(15, 20, 30, 40);
    /// assert_eq!(rect.left(), 15);
    /// assert_eq!(rect.bot(), 20);
    /// assert_eq!(rect.right(), 30);
    /// assert_eq!(rect.top(), 40);
    /// ```
    #[inline]
    pub fn from_sides(left: i64, bot: i64, right: i64, top: i64) -> Self {
        Self::new(Point::new(left, bot), Point::new(right, top))
    }

    /// Creates a rectangle from all 4 sides, returning [`None`] if the
    /// sides are out of order.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert!(Rect::from_sides_option(0, 0, 10, 10).is_some());
    /// assert_eq!(Rect::from_sides_option(10, 0, 0, 10), None);
    /// ```
    pub fn from_sides_option(left: i64, bot: i64, right: i64, top: i64) -> Option<Self> {
        if left > right || bot > top {
            None
        } else {
            Some(Self::from_sides(left, bot, right, top))
        }
    }

    /// Creates a rectangle from two arbitrary corners, sorting coordinates as needed.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_corners(Point::new(10, -5), Point::new(-10, 5));
    /// assert_eq!(rect, Rect::from_sides(-10, -5, 10, 5));
    /// ```
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::from_sides(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }

    /// Creates a rectangle of the given width and height centered at `center`.
    ///
    /// Odd dimensions are split with the extra unit on the upper/right side.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_center(Point::new(0, 0), 100, 40);
    /// assert_eq!(rect, Rect::from_sides(-50, -20, 50, 20));
    /// ```
    pub fn from_center(center: Point, width: i64, height: i64) -> Self {
        let (w, h) = (width.abs(), height.abs());
        Self::from_sides(
            center.x - w / 2,
            center.y - h / 2,
            center.x + w - w / 2,
            center.y + h - h / 2,
        )
    }

    /// Returns the center point of the rectangle, rounded down.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(0, 0, 200, 100);
    /// assert_eq!(rect.center(), Point::new(100, 50));
    /// ```
    pub const fn center(&self) -> Point {
        Point::new((self.p0.x + self.p1.x) / 2, (self.p0.y + self.p1.y) / 2)
    }

    /// The bottom y-coordinate of the rectangle.
    #[inline]
    pub const fn bot(&self) -> i64 {
        self.p0.y
    }

    /// The top y-coordinate of the rectangle.
    #[inline]
    pub const fn top(&self) -> i64 {
        self.p1.y
    }

    /// The left x-coordinate of the rectangle.
    #[inline]
    pub const fn left(&self) -> i64 {
        self.p0.x
    }

    /// The right x-coordinate of the rectangle.
    #[inline]
    pub const fn right(&self) -> i64 {
        self.p1.x
    }

    /// The sides as a `(minx, miny, maxx, maxy)` tuple.
    #[inline]
    pub const fn sides(&self) -> (i64, i64, i64, i64) {
        (self.p0.x, self.p0.y, self.p1.x, self.p1.y)
    }

    /// The lower-left corner.
    #[inline]
    pub const fn lower_left(&self) -> Point {
        self.p0
    }

    /// The upper-right corner.
    #[inline]
    pub const fn upper_right(&self) -> Point {
        self.p1
    }

    /// The horizontal width of the rectangle.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(0, 0, 100, 200);
    /// assert_eq!(rect.width(), 100);
    /// ```
    #[inline]
    pub const fn width(&self) -> i64 {
        self.p1.x - self.p0.x
    }

    /// The vertical height of the rectangle.
    #[inline]
    pub const fn height(&self) -> i64 {
        self.p1.y - self.p0.y
    }

    /// The length of the rectangle along direction `dir`.
    pub const fn length(&self, dir: Dir) -> i64 {
        match dir {
            Dir::Horiz => self.width(),
            Dir::Vert => self.height(),
        }
    }

    /// The area of the rectangle.
    #[inline]
    pub const fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// The four corners in counterclockwise order, starting at the lower left.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.p0,
            Point::new(self.p1.x, self.p0.y),
            self.p1,
            Point::new(self.p0.x, self.p1.y),
        ]
    }

    /// Converts this rectangle into an equivalent polygon.
    pub fn to_polygon(&self) -> Polygon {
        Polygon::from_verts(self.corners().to_vec())
    }

    /// Computes the rectangular union of this `Rect` with another `Rect`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let r1 = Rect::from_sides(0, 0, 100, 200);
    /// let r2 = Rect::from_sides(-50, 20, 120, 160);
    /// assert_eq!(r1.union(r2), Rect::from_sides(-50, 0, 120, 200));
    /// ```
    pub fn union(self, other: Self) -> Self {
        Rect::new(
            Point::new(self.p0.x.min(other.p0.x), self.p0.y.min(other.p0.y)),
            Point::new(self.p1.x.max(other.p1.x), self.p1.y.max(other.p1.y)),
        )
    }

    /// Calculates the rectangular union of all `Option<Rect>`s provided.
    ///
    /// All `None` elements in the iterator are ignored.
    /// If the iterator has no `Some(_)` elements, this function returns [`None`].
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rects = vec![
    ///     Some(Rect::from_sides(10, 20, 30, 40)),
    ///     None,
    ///     Some(Rect::from_sides(-10, 25, 20, 35)),
    /// ];
    /// assert_eq!(Rect::union_all_option(rects.into_iter()), Some(Rect::from_sides(-10, 20, 30, 40)));
    /// ```
    pub fn union_all_option<T>(rects: impl Iterator<Item = T>) -> Option<Self>
    where
        T: Into<Option<Self>>,
    {
        rects
            .filter_map(|r| r.into())
            .fold(None, |acc, r| match acc {
                Some(acc) => Some(acc.union(r)),
                None => Some(r),
            })
    }

    /// Computes the rectangular intersection of this `Rect` with another `Rect`.
    ///
    /// Returns `None` if the intersection is empty.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let r1 = Rect::from_sides(0, 0, 100, 200);
    /// let r2 = Rect::from_sides(-50, 20, 120, 160);
    /// assert_eq!(r1.intersection(r2), Some(Rect::from_sides(0, 20, 100, 160)));
    ///
    /// let r2 = Rect::from_sides(120, -60, 240, 800);
    /// assert_eq!(r1.intersection(r2), None);
    /// ```
    pub fn intersection(self, other: Self) -> Option<Self> {
        let pmin = Point::new(self.p0.x.max(other.p0.x), self.p0.y.max(other.p0.y));
        let pmax = Point::new(self.p1.x.min(other.p1.x), self.p1.y.min(other.p1.y));

        if pmin.x > pmax.x || pmin.y > pmax.y {
            return None;
        }

        Some(Rect::new(pmin, pmax))
    }

    /// Expands the rectangle by `dx` on the left and right and by `dy` on
    /// the top and bottom.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(0, 0, 100, 200);
    /// assert_eq!(rect.expand_xy(10, 20), Rect::from_sides(-10, -20, 110, 220));
    /// ```
    pub fn expand_xy(&self, dx: i64, dy: i64) -> Self {
        Self::from_sides(
            self.p0.x - dx,
            self.p0.y - dy,
            self.p1.x + dx,
            self.p1.y + dy,
        )
    }

    /// Expands the rectangle by `amount` on all sides.
    #[inline]
    pub fn expand_all(&self, amount: i64) -> Self {
        self.expand_xy(amount, amount)
    }

    /// Clamps each side of this rectangle to lie within `bounds`.
    ///
    /// Returns [`None`] if the two rectangles do not overlap.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let chip = Rect::from_sides(-100, -100, 100, 100);
    /// let grown = Rect::from_sides(-50, -150, 60, 40);
    /// assert_eq!(grown.clamp_to(chip), Some(Rect::from_sides(-50, -100, 60, 40)));
    /// ```
    #[inline]
    pub fn clamp_to(&self, bounds: Rect) -> Option<Self> {
        self.intersection(bounds)
    }
}

impl Bbox for Rect {
    fn bbox(&self) -> Option<Rect> {
        Some(*self)
    }
}

impl TranslateMut for Rect {
    fn translate_mut(&mut self, p: Point) {
        self.p0.translate_mut(p);
        self.p1.translate_mut(p);
    }
}

impl TransformMut for Rect {
    /// Transforms the rectangle and replaces it with the bounding box of
    /// its transformed corners.
    ///
    /// For non-Manhattan transforms this grows the rectangle; convert to a
    /// [`Polygon`] first to keep the exact outline.
    fn transform_mut(&mut self, trans: Transformation) {
        let mut corners = self.corners();
        for c in corners.iter_mut() {
            c.transform_mut(trans);
        }
        let xs = corners.iter().map(|c| c.x);
        let ys = corners.iter().map(|c| c.y);
        let (minx, maxx) = (xs.clone().min(), xs.max());
        let (miny, maxy) = (ys.clone().min(), ys.max());
        if let (Some(minx), Some(maxx), Some(miny), Some(maxy)) = (minx, maxx, miny, maxy) {
            *self = Rect::from_sides(minx, miny, maxx, maxy);
        }
    }
}

impl BoundingUnion<Rect> for Rect {
    type Output = Rect;
    fn bounding_union(&self, other: &Rect) -> Self::Output {
        self.union(*other)
    }
}

impl Contains<Point> for Rect {
    fn contains(&self, other: &Point) -> Containment {
        if other.x >= self.p0.x
            && other.x <= self.p1.x
            && other.y >= self.p0.y
            && other.y <= self.p1.y
        {
            Containment::Full
        } else {
            Containment::None
        }
    }
}

impl Contains<Rect> for Rect {
    fn contains(&self, other: &Rect) -> Containment {
        match self.intersection(*other) {
            None => Containment::None,
            Some(r) if r == *other => Containment::Full,
            Some(_) => Containment::Partial,
        }
    }
}
