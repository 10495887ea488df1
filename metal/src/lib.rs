//! Metal: layer-stack-aware design tables for superconducting quantum chips.
//!
//! A [`Design`] holds components, the pins they expose, the nets joining
//! those pins and the geometry tables they draw into. Renderers turn the
//! tables into simulator input.

pub mod bounds;
pub mod component;
pub mod design;
pub mod error;
pub mod id;
pub mod layer_stack;
pub mod naming;
pub mod net;
pub mod parse;
pub mod qgeometry;
pub mod renderer;
pub mod validation;

#[cfg(test)]
mod tests;

#[doc(inline)]
pub use design::Design;
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use geometry;
