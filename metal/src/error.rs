//! Error types and error handling utilities.

use std::sync::Arc;

use arcstr::ArcStr;

use crate::component::pin::PinInputError;
use crate::id::ComponentId;
use crate::layer_stack::LayerStackError;
use crate::parse::ParseError;
use crate::qgeometry::ElementKind;
use crate::renderer::RenderError;

/// A result type returning metal errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for metal design operations.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// A component with the given name already exists and overwriting is disabled.
    #[error("a component named `{0}` already exists; enable `overwrite_enabled` to replace it")]
    NameInUse(ArcStr),
    /// No component has the given name.
    #[error("no component named `{0}`")]
    ComponentNotFound(ArcStr),
    /// No component has the given ID.
    #[error("no component with ID {0}")]
    ComponentIdNotFound(ComponentId),
    /// No component class is registered under the given name.
    #[error("unknown component class `{0}`")]
    UnknownClass(ArcStr),
    /// A component's `pin_inputs` failed validation.
    #[error("invalid pin inputs for component `{component}`: {source}")]
    PinInput {
        /// The component being added.
        component: ArcStr,
        /// The failed check.
        source: PinInputError,
    },
    /// An option value could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// An option is missing or has the wrong type.
    #[error("option `{option}` of `{component}`: expected {expected}, found `{found}`")]
    InvalidOption {
        /// The component or renderer that owns the option.
        component: ArcStr,
        /// The option key.
        option: ArcStr,
        /// What the option should have been.
        expected: &'static str,
        /// The offending value.
        found: String,
    },
    /// A geometry element could not be made.
    #[error("component `{component}` failed to build: {message}")]
    Make {
        /// The component being built.
        component: ArcStr,
        /// What went wrong.
        message: String,
    },
    /// A pin was defined by two coincident points.
    #[error("pin `{pin}` has coincident points")]
    DegeneratePin {
        /// The pin name.
        pin: ArcStr,
    },
    /// The given string does not name a geometry table.
    #[error("unknown element type `{0}`; expected one of poly, path, junction")]
    UnknownElementType(String),
    /// A geometry shape does not belong in the given table.
    #[error("element `{name}` cannot be stored in the {kind} table")]
    WrongGeometryKind {
        /// The table that rejected the shape.
        kind: ElementKind,
        /// The element name.
        name: ArcStr,
    },
    /// A row specified a renderer column that no renderer registered.
    #[error("unknown column `{column}` for the {kind} table")]
    UnknownColumn {
        /// The table.
        kind: ElementKind,
        /// The column name.
        column: ArcStr,
    },
    /// An error loading a layer stack.
    #[error(transparent)]
    LayerStack(#[from] LayerStackError),
    /// An error rendering a design.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// An error reading or writing a design file.
    #[error("invalid design file: {0}")]
    DesignFile(String),
    /// An I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<toml::de::Error> for Error {
    fn from(value: toml::de::Error) -> Self {
        Self::DesignFile(value.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(value: toml::ser::Error) -> Self {
        Self::DesignFile(value.to_string())
    }
}
