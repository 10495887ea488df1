//! Traits and types for specifying when one object contains another.

use serde::{Deserialize, Serialize};

/// Ways in which an inner object can be contained within an enclosing shape.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Containment {
    /// The shape does not contain any part of the object.
    None,
    /// The shape contains some, but not all, of the object.
    Partial,
    /// The shape fully contains the object.
    Full,
}

/// Provides information on whether a shape contains another object.
pub trait Contains<T: ?Sized> {
    /// Returns a [`Containment`] indicating how `other` is enclosed within this shape.
    fn contains(&self, other: &T) -> Containment;

    /// Returns true if `other` is fully enclosed in this shape.
    #[inline]
    fn encloses(&self, other: &T) -> bool {
        self.contains(other).is_full()
    }
}

impl Containment {
    /// Returns true if the object is fully contained.
    #[inline]
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }

    /// Returns true if no part of the object is contained.
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}
