//! Transformation types and traits.
//!
//! Components may be placed at arbitrary angles, so unlike a purely
//! Manhattan layout tool the transformation matrix is kept in floating
//! point. Coordinates are rounded back onto the integer grid after each
//! transformation.

use impl_trait_for_tuples::impl_for_tuples;
use serde::{Deserialize, Serialize};

use crate::point::Point;
use crate::vector::Vec2;
use crate::wrap_angle;

/// An affine transformation consisting of a rotation, an optional
/// reflection, and a translation.
///
/// The translation `b` is applied after the linear part `a`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    /// The 2x2 linear part.
    pub(crate) a: [[f64; 2]; 2],
    /// The x-y translation applied after the linear part.
    pub(crate) b: [f64; 2],
}

impl Default for Transformation {
    fn default() -> Self {
        Self::identity()
    }
}

/// Cosine and sine of an angle in degrees, exact at multiples of 90 degrees.
fn cos_sin(degrees: f64) -> (f64, f64) {
    let wrapped = wrap_angle(degrees);
    match wrapped {
        w if w == 0. => (1., 0.),
        w if w == 90. => (0., 1.),
        w if w == 180. => (-1., 0.),
        w if w == 270. => (0., -1.),
        w => {
            let r = w.to_radians();
            (r.cos(), r.sin())
        }
    }
}

impl Transformation {
    /// Returns the identity transform, leaving any transformed object unmodified.
    pub const fn identity() -> Self {
        Self {
            a: [[1., 0.], [0., 1.]],
            b: [0., 0.],
        }
    }

    /// Returns a translation by `(x,y)`.
    pub fn translate(x: i64, y: i64) -> Self {
        Self {
            a: [[1., 0.], [0., 1.]],
            b: [x as f64, y as f64],
        }
    }

    /// Returns a counterclockwise rotation by `degrees` about the origin.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let p = Point::new(10, 0).transform(Transformation::rotate(90.));
    /// assert_eq!(p, Point::new(0, 10));
    /// ```
    pub fn rotate(degrees: f64) -> Self {
        let (c, s) = cos_sin(degrees);
        Self {
            a: [[c, -s], [s, c]],
            b: [0., 0.],
        }
    }

    /// Returns a reflection about the x-axis.
    pub const fn reflect_vert() -> Self {
        Self {
            a: [[1., 0.], [0., -1.]],
            b: [0., 0.],
        }
    }

    /// Creates a transform that rotates by `degrees` and then translates by `offset`.
    ///
    /// This is the placement transform of a component with options
    /// `pos_x`, `pos_y` and `orientation`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let t = Transformation::from_opts(Point::new(100, 0), 180.);
    /// assert_eq!(Point::new(10, 5).transform(t), Point::new(90, -5));
    /// ```
    pub fn from_opts(offset: Point, degrees: f64) -> Self {
        let mut t = Self::rotate(degrees);
        t.b = [offset.x as f64, offset.y as f64];
        t
    }

    /// Creates a new [`Transformation`] that is the cascade of `parent` and `child`.
    ///
    /// "Parents" and "children" refer to typical layout-instance hierarchies,
    /// in which each layer of instance has a nested set of transformations
    /// relative to its top-level parent: the child is applied first.
    pub fn cascade(parent: Transformation, child: Transformation) -> Transformation {
        let p = parent.a;
        let c = child.a;
        let a = [
            [
                p[0][0] * c[0][0] + p[0][1] * c[1][0],
                p[0][0] * c[0][1] + p[0][1] * c[1][1],
            ],
            [
                p[1][0] * c[0][0] + p[1][1] * c[1][0],
                p[1][0] * c[0][1] + p[1][1] * c[1][1],
            ],
        ];
        let (bx, by) = parent.apply(child.b[0], child.b[1]);
        Self { a, b: [bx, by] }
    }

    /// Returns the inverse transformation.
    pub fn inv(&self) -> Transformation {
        let [[a, b], [c, d]] = self.a;
        let det = a * d - b * c;
        let inv = [[d / det, -b / det], [-c / det, a / det]];
        let bx = -(inv[0][0] * self.b[0] + inv[0][1] * self.b[1]);
        let by = -(inv[1][0] * self.b[0] + inv[1][1] * self.b[1]);
        Self {
            a: inv,
            b: [bx, by],
        }
    }

    /// The point `(0, 0)` is mapped to by this transform.
    pub fn offset_point(&self) -> Point {
        Point::from_f64(self.b[0], self.b[1])
    }

    /// The rotation angle of this transform in degrees, in `[0, 360)`.
    pub fn angle(&self) -> f64 {
        wrap_angle(self.a[1][0].atan2(self.a[0][0]).to_degrees())
    }

    /// Returns true if this transform maps axis-aligned rectangles to
    /// axis-aligned rectangles.
    pub fn is_manhattan(&self) -> bool {
        let [[a, b], [c, d]] = self.a;
        (b == 0. && c == 0.) || (a == 0. && d == 0.)
    }

    /// Applies the transform to floating point coordinates.
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a[0][0] * x + self.a[0][1] * y + self.b[0],
            self.a[1][0] * x + self.a[1][1] * y + self.b[1],
        )
    }

    /// Applies only the linear part of the transform to a direction vector.
    #[inline]
    pub fn apply_vec(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.a[0][0] * v.x + self.a[0][1] * v.y,
            self.a[1][0] * v.x + self.a[1][1] * v.y,
        )
    }
}

/// A trait for specifying how an object is changed by a [`Transformation`].
#[impl_for_tuples(32)]
pub trait TransformMut {
    /// Applies matrix-vector [`Transformation`] `trans`.
    fn transform_mut(&mut self, trans: Transformation);
}

impl<T: TransformMut> TransformMut for Vec<T> {
    fn transform_mut(&mut self, trans: Transformation) {
        for i in self.iter_mut() {
            i.transform_mut(trans);
        }
    }
}

impl<T: TransformMut> TransformMut for Option<T> {
    fn transform_mut(&mut self, trans: Transformation) {
        if let Some(inner) = self.as_mut() {
            inner.transform_mut(trans);
        }
    }
}

/// A trait for specifying how an object is changed by a [`Transformation`].
///
/// Takes in an owned copy of the shape and returns the transformed version.
pub trait Transform: TransformMut + Sized {
    /// Applies matrix-vector [`Transformation`] `trans`.
    ///
    /// Creates a new shape at a location equal to the transformation of the original.
    #[inline]
    fn transform(mut self, trans: Transformation) -> Self {
        self.transform_mut(trans);
        self
    }
}

impl<T: TransformMut + Sized> Transform for T {}

/// A trait for specifying how a shape is translated by a [`Point`].
#[impl_for_tuples(32)]
pub trait TranslateMut {
    /// Translates the shape by a [`Point`] through mutation.
    fn translate_mut(&mut self, p: Point);
}

impl<T: TranslateMut> TranslateMut for Vec<T> {
    fn translate_mut(&mut self, p: Point) {
        for i in self.iter_mut() {
            i.translate_mut(p);
        }
    }
}

impl<T: TranslateMut> TranslateMut for Option<T> {
    fn translate_mut(&mut self, p: Point) {
        if let Some(inner) = self.as_mut() {
            inner.translate_mut(p);
        }
    }
}

/// A trait for specifying how a shape is translated by a [`Point`].
///
/// Takes in an owned copy of the shape and returns the translated version.
pub trait Translate: TranslateMut + Sized {
    /// Translates the shape by a [`Point`].
    #[inline]
    fn translate(mut self, p: Point) -> Self {
        self.translate_mut(p);
        self
    }
}

impl<T: TranslateMut + Sized> Translate for T {}
