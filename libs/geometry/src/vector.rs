//! Floating point direction vectors.
//!
//! Pin normals and tangents are unit vectors that generally do not land
//! on the integer grid, so they are kept in floating point.

use serde::{Deserialize, Serialize};

use crate::dir::Dir;

/// A 2-D vector with floating point components.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    /// The x-component.
    pub x: f64,
    /// The y-component.
    pub y: f64,
}

impl Vec2 {
    /// Creates a new vector.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The Euclidean length of the vector.
    #[inline]
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Returns the vector scaled to unit length.
    ///
    /// Returns [`None`] for the zero vector.
    pub fn unit(&self) -> Option<Self> {
        let n = self.norm();
        if n == 0. {
            None
        } else {
            Some(Self::new(self.x / n, self.y / n))
        }
    }

    /// Rotates the vector counterclockwise by 90 degrees.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Vec2::new(1., 0.).rot90(), Vec2::new(0., 1.));
    /// ```
    #[inline]
    pub fn rot90(&self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Rotates the vector clockwise by 90 degrees.
    #[inline]
    pub fn rot270(&self) -> Self {
        Self::new(self.y, -self.x)
    }

    /// The dot product of two vectors.
    #[inline]
    pub fn dot(&self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Returns [`Dir::Horiz`] if the vector points mostly along x, and
    /// [`Dir::Vert`] otherwise.
    ///
    /// Ties go to [`Dir::Vert`].
    pub fn dominant_dir(&self) -> Dir {
        if self.x.abs() > self.y.abs() {
            Dir::Horiz
        } else {
            Dir::Vert
        }
    }

    /// Rounds both components to `digits` decimal places.
    pub fn round_to(&self, digits: i32) -> Self {
        let scale = 10f64.powi(digits);
        Self::new(
            (self.x * scale).round() / scale,
            (self.y * scale).round() / scale,
        )
    }
}

impl std::ops::Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}
