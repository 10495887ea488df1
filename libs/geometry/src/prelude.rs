//! An import prelude that re-exports commonly used items.

pub use crate::bbox::Bbox;
pub use crate::contains::{Containment, Contains};
pub use crate::dir::Dir;
pub use crate::path::Path;
pub use crate::point::Point;
pub use crate::polygon::Polygon;
pub use crate::rect::Rect;
pub use crate::shape::Shape;
pub use crate::touch::Touches;
pub use crate::transform::{Transform, TransformMut, Transformation, Translate, TranslateMut};
pub use crate::union::BoundingUnion;
pub use crate::vector::Vec2;
