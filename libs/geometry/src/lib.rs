//! 2-D geometric primitives for superconducting chip layout.
//!
//! All coordinates are integers in database units. The `metal` crate uses
//! one nanometer per unit.
//!
//! # Examples
//!
//! Create a [rectangle](crate::rect::Rect):
//!
//! ```
//! # use geometry::prelude::*;
//! let rect = Rect::from_sides(10, 20, 30, 40);
//! ```
#![warn(missing_docs)]

extern crate self as geometry;

pub mod bbox;
pub mod contains;
pub mod dir;
pub mod path;
pub mod point;
pub mod polygon;
pub mod prelude;
pub mod rect;
pub mod shape;
pub mod touch;
pub mod transform;
pub mod union;
pub mod vector;

/// Wraps the given angle to the interval `[0, 360)` degrees.
///
/// # Examples
///
/// ```
/// use geometry::wrap_angle;
///
/// assert_eq!(wrap_angle(10.), 10.);
/// assert_eq!(wrap_angle(-10.), 350.);
/// assert_eq!(wrap_angle(-740.), 340.);
/// assert_eq!(wrap_angle(725.), 5.);
/// assert_eq!(wrap_angle(360.), 0.);
/// ```
pub fn wrap_angle(angle: f64) -> f64 {
    ((angle % 360.) + 360.) % 360.
}
