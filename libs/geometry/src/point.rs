//! 2-D points.

use serde::{Deserialize, Serialize};

use crate::dir::Dir;
use crate::transform::{TransformMut, Transformation, TranslateMut};
use crate::vector::Vec2;

/// A point in two-dimensional space.
#[derive(
    Debug, Copy, Clone, Default, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Point {
    /// The x-coordinate of the point.
    pub x: i64,
    /// The y-coordinate of the point.
    pub y: i64,
}

impl Point {
    /// Creates a new [`Point`] from (x,y) coordinates.
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Returns the origin, `(0, 0)`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let origin = Point::zero();
    /// assert_eq!(origin, Point::new(0, 0));
    /// ```
    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0, y: 0 }
    }

    /// Gets the coordinate associated with direction `dir`.
    pub const fn coord(&self, dir: Dir) -> i64 {
        match dir {
            Dir::Horiz => self.x,
            Dir::Vert => self.y,
        }
    }

    /// Rounds floating point coordinates to the nearest [`Point`].
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self::new(x.round() as i64, y.round() as i64)
    }

    /// Returns the midpoint of two points, rounded toward negative infinity.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Point::new(0, 0).midpoint(Point::new(10, 5)), Point::new(5, 2));
    /// ```
    pub fn midpoint(self, other: Point) -> Self {
        Self::new(
            (self.x + other.x).div_euclid(2),
            (self.y + other.y).div_euclid(2),
        )
    }

    /// Converts this point to a floating point vector.
    #[inline]
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x as f64, self.y as f64)
    }

    /// Offsets this point by a floating point vector, rounding the result.
    pub fn offset(self, v: Vec2) -> Self {
        Self::from_f64(self.x as f64 + v.x, self.y as f64 + v.y)
    }

    /// The Euclidean distance between two points.
    pub fn distance(self, other: Point) -> f64 {
        (other - self).to_vec2().norm()
    }
}

impl TranslateMut for Point {
    fn translate_mut(&mut self, p: Point) {
        self.x += p.x;
        self.y += p.y;
    }
}

impl TransformMut for Point {
    fn transform_mut(&mut self, trans: Transformation) {
        let (x, y) = trans.apply(self.x as f64, self.y as f64);
        self.x = x.round() as i64;
        self.y = y.round() as i64;
    }
}

impl std::ops::Add<Point> for Point {
    type Output = Self;
    fn add(self, rhs: Point) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign<Point> for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub<Point> for Point {
    type Output = Self;
    fn sub(self, rhs: Point) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::SubAssign<Point> for Point {
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl std::ops::Neg for Point {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

impl From<(i64, i64)> for Point {
    fn from(value: (i64, i64)) -> Self {
        Self {
            x: value.0,
            y: value.1,
        }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
