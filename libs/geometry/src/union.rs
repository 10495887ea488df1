//! Traits for computing bounding unions of geometric objects.

use crate::bbox::Bbox;
use crate::rect::Rect;

/// Trait for calculating the union with another geometric object.
///
/// The result is the smallest rectangle that encloses both objects.
pub trait BoundingUnion<T: ?Sized> {
    /// The type of the output shape representing the union.
    type Output;
    /// Calculates the bounding union of this shape with `other`.
    fn bounding_union(&self, other: &T) -> Self::Output;
}

impl<T: Bbox> BoundingUnion<T> for Option<Rect> {
    type Output = Option<Rect>;

    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let acc: Option<Rect> = None;
    /// let acc = acc.bounding_union(&Rect::from_sides(0, 0, 10, 10));
    /// let acc = acc.bounding_union(&Rect::from_sides(-5, 2, 3, 4));
    /// assert_eq!(acc, Some(Rect::from_sides(-5, 0, 10, 10)));
    /// ```
    fn bounding_union(&self, other: &T) -> Self::Output {
        match (self, other.bbox()) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (Some(a), None) => Some(*a),
            (None, b) => b,
        }
    }
}
