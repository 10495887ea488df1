//! Axis-aligned rectangular bounding boxes.

use impl_trait_for_tuples::impl_for_tuples;

use crate::{rect::Rect, union::BoundingUnion};

/// A geometric shape that has a bounding box.
///
/// # Examples
///
/// ```
/// # use geometry::prelude::*;
/// let rect = Rect::from_sides(0, 0, 100, 200);
/// assert_eq!(rect.bbox(), Some(Rect::from_sides(0, 0, 100, 200)));
/// ```
pub trait Bbox {
    /// Computes the axis-aligned rectangular bounding box.
    ///
    /// If empty, this method should return `None`.
    /// Note that points and zero-area rectangles are not empty:
    /// their bounding box implementations return `Some(_)`.
    fn bbox(&self) -> Option<Rect>;
}

impl<T> Bbox for &T
where
    T: Bbox + ?Sized,
{
    fn bbox(&self) -> Option<Rect> {
        T::bbox(*self)
    }
}

#[impl_for_tuples(16)]
impl Bbox for TupleIdentifier {
    #[allow(clippy::let_and_return)]
    fn bbox(&self) -> Option<Rect> {
        let mut bbox: Option<Rect> = None;
        for_tuples!( #( bbox = bbox.bounding_union(&TupleIdentifier.bbox()); )* );
        bbox
    }
}

impl<T: Bbox> Bbox for [T] {
    fn bbox(&self) -> Option<Rect> {
        let mut bbox: Option<Rect> = None;
        for item in self {
            bbox = bbox.bounding_union(item);
        }
        bbox
    }
}

impl<T: Bbox> Bbox for Vec<T> {
    fn bbox(&self) -> Option<Rect> {
        self.as_slice().bbox()
    }
}

impl Bbox for Option<Rect> {
    fn bbox(&self) -> Option<Rect> {
        *self
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn bbox_works_for_tuples() {
        let tuple = (
            Rect::from_sides(0, 0, 100, 200),
            Rect::from_sides(-50, 20, 90, 250),
        );
        assert_eq!(tuple.bbox(), Some(Rect::from_sides(-50, 0, 100, 250)));
    }

    #[test]
    fn bbox_works_for_vecs() {
        let v = vec![
            Rect::from_sides(0, 0, 100, 200),
            Rect::from_sides(-50, 20, 90, 250),
        ];
        assert_eq!(v.bbox(), Some(Rect::from_sides(-50, 0, 100, 250)));
        assert_eq!(Vec::<Rect>::new().bbox(), None);
    }

    #[test]
    fn bbox_works_for_diff_types() {
        let points = vec![
            Point { x: -10, y: 25 },
            Point { x: 0, y: 16 },
            Point { x: 40, y: -20 },
        ];
        let tuple: (Rect, Polygon, Path) = (
            Rect::from_sides(0, 0, 100, 200),
            Polygon::from_verts(points),
            Path::new(vec![Point::new(0, 300), Point::new(10, 300)], 50),
        );
        assert_eq!(tuple.bbox(), Some(Rect::from_sides(-10, -20, 100, 300)));
    }
}
