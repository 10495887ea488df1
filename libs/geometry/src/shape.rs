//! An enumeration of geometric shapes and their properties.

use serde::{Deserialize, Serialize};

use crate::{
    bbox::Bbox,
    path::Path,
    point::Point,
    polygon::Polygon,
    rect::Rect,
    touch::Touches,
    transform::{TransformMut, Transformation, TranslateMut},
};

/// An enumeration of geometric shapes.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// A rectangle.
    Rect(Rect),
    /// A polygon.
    Polygon(Polygon),
    /// A path with a width.
    Path(Path),
}

impl Shape {
    /// If this shape is a rectangle, returns the contained rectangle.
    /// Otherwise, returns [`None`].
    pub fn rect(&self) -> Option<Rect> {
        match self {
            Self::Rect(r) => Some(*r),
            _ => None,
        }
    }

    /// If this shape is a polygon, returns the contained polygon.
    /// Otherwise, returns [`None`].
    pub fn polygon(&self) -> Option<&Polygon> {
        match self {
            Self::Polygon(p) => Some(p),
            _ => None,
        }
    }

    /// If this shape is a path, returns the contained path.
    /// Otherwise, returns [`None`].
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the shape as a rectangle if it is one, or a polygon that
    /// happens to be an axis-aligned rectangle.
    pub fn as_rect(&self) -> Option<Rect> {
        match self {
            Self::Rect(r) => Some(*r),
            Self::Polygon(p) => p.as_rect(),
            Self::Path(_) => None,
        }
    }

    /// The outline of this shape as a list of polygons.
    ///
    /// Paths are approximated by one polygon per segment.
    pub fn outline(&self) -> Vec<Polygon> {
        match self {
            Self::Rect(r) => vec![r.to_polygon()],
            Self::Polygon(p) => vec![p.clone()],
            Self::Path(p) => p.segment_polygons(),
        }
    }
}

impl TranslateMut for Shape {
    fn translate_mut(&mut self, p: Point) {
        match self {
            Shape::Rect(rect) => rect.translate_mut(p),
            Shape::Polygon(polygon) => polygon.translate_mut(p),
            Shape::Path(path) => path.translate_mut(p),
        };
    }
}

impl TransformMut for Shape {
    /// Transforms the shape.
    ///
    /// Rectangles become polygons under non-Manhattan transforms so the
    /// outline is preserved exactly.
    fn transform_mut(&mut self, trans: Transformation) {
        match self {
            Shape::Rect(rect) if !trans.is_manhattan() => {
                let mut poly = rect.to_polygon();
                poly.transform_mut(trans);
                *self = Shape::Polygon(poly);
            }
            Shape::Rect(rect) => rect.transform_mut(trans),
            Shape::Polygon(polygon) => polygon.transform_mut(trans),
            Shape::Path(path) => path.transform_mut(trans),
        }
    }
}

impl Bbox for Shape {
    fn bbox(&self) -> Option<Rect> {
        match self {
            Shape::Rect(rect) => rect.bbox(),
            Shape::Polygon(polygon) => polygon.bbox(),
            Shape::Path(path) => path.bbox(),
        }
    }
}

impl Touches for Shape {
    fn touches(&self, other: &Shape) -> bool {
        self.outline().as_slice().touches(other.outline().as_slice())
    }
}

impl From<Rect> for Shape {
    #[inline]
    fn from(value: Rect) -> Self {
        Self::Rect(value)
    }
}

impl From<Polygon> for Shape {
    #[inline]
    fn from(value: Polygon) -> Self {
        Self::Polygon(value)
    }
}

impl From<Path> for Shape {
    #[inline]
    fn from(value: Path) -> Self {
        Self::Path(value)
    }
}
