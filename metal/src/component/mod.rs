//! Placed parametric components and the classes that build them.
//!
//! A [`Component`] is data: a name, raw options and the pins produced by its
//! last build. The geometry itself comes from a [`ComponentClass`], which
//! reads parsed options through a [`MakeContext`] and emits table rows and
//! pins in the component's local frame.

pub mod library;
pub mod pin;

use std::fmt::Debug;
use std::sync::Arc;

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::ComponentId;
use crate::parse::{options, Options, ParsedOptions, Value};
use crate::qgeometry::{ElementKind, ElementOptions};

use self::pin::Pin;

/// The build state of a component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Never built.
    #[default]
    NotBuilt,
    /// The last build succeeded.
    Good,
    /// The last build failed.
    Failed,
}

/// A component placed in a design.
#[derive(Debug, Clone)]
pub struct Component {
    pub(crate) id: ComponentId,
    pub(crate) name: ArcStr,
    pub(crate) class_name: ArcStr,
    pub(crate) options: Options,
    pub(crate) pins: IndexMap<ArcStr, Pin>,
    pub(crate) status: Status,
    pub(crate) made: bool,
    pub(crate) metadata: Options,
}

impl Component {
    pub(crate) fn new(
        id: ComponentId,
        name: ArcStr,
        class_name: ArcStr,
        options: Options,
    ) -> Self {
        Self {
            id,
            name,
            class_name,
            options,
            pins: IndexMap::new(),
            status: Status::NotBuilt,
            made: false,
            metadata: Options::new(),
        }
    }

    /// The component ID.
    #[inline]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// The component name.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The name of the class that builds this component.
    #[inline]
    pub fn class_name(&self) -> &ArcStr {
        &self.class_name
    }

    /// The raw options: class defaults merged with user overrides.
    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The pins from the last successful build.
    #[inline]
    pub fn pins(&self) -> &IndexMap<ArcStr, Pin> {
        &self.pins
    }

    /// A pin by name.
    pub fn pin(&self, name: &str) -> Option<&Pin> {
        self.pins.get(name)
    }

    /// The build state.
    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns `true` once the component has been built at least once.
    #[inline]
    pub fn made(&self) -> bool {
        self.made
    }

    /// Free-form metadata.
    #[inline]
    pub fn metadata(&self) -> &Options {
        &self.metadata
    }

    /// Mutable access to the metadata.
    pub fn metadata_mut(&mut self) -> &mut Options {
        &mut self.metadata
    }
}

/// Options every class accepts.
pub fn common_options() -> Options {
    options([
        ("pos_x", "0um"),
        ("pos_y", "0um"),
        ("orientation", "0"),
        ("chip", "main"),
        ("layer", "1"),
    ])
}

/// A parametric geometry generator.
pub trait ComponentClass: Debug {
    /// The name used to register and look up the class.
    fn class_name(&self) -> &'static str;

    /// The prefix of automatically generated component names.
    fn short_name(&self) -> &'static str;

    /// Class-specific option defaults, layered over [`common_options`].
    fn default_options(&self) -> Options;

    /// The geometry tables this class writes to.
    ///
    /// A build that writes to any other table fails.
    fn element_kinds(&self) -> &'static [ElementKind];

    /// Builds the component.
    fn make(&self, ctx: &mut MakeContext<'_>) -> Result<()>;

    /// The full option template: common options, then class defaults.
    fn template_options(&self) -> Options {
        let mut opts = common_options();
        crate::parse::merge_options(&mut opts, &self.default_options());
        opts
    }
}

/// The component classes available to a design, by class name.
#[derive(Debug, Clone)]
pub struct ClassRegistry {
    classes: IndexMap<ArcStr, Arc<dyn ComponentClass>>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        let mut reg = Self::empty();
        for class in library::builtins() {
            reg.register(class);
        }
        reg
    }
}

impl ClassRegistry {
    /// A registry with no classes.
    pub fn empty() -> Self {
        Self {
            classes: IndexMap::new(),
        }
    }

    /// Adds a class, replacing any class with the same name.
    pub fn register(&mut self, class: Arc<dyn ComponentClass>) {
        let name = ArcStr::from(class.class_name());
        if self.classes.insert(name.clone(), class).is_some() {
            tracing::debug!(class = %name, "replaced component class");
        }
    }

    /// Looks up a class.
    pub fn get(&self, name: &str) -> Result<Arc<dyn ComponentClass>> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownClass(name.into()))
    }

    /// The registered class names.
    pub fn names(&self) -> impl Iterator<Item = &ArcStr> {
        self.classes.keys()
    }
}

/// An element queued by [`MakeContext::add_qgeometry`].
#[derive(Debug, Clone)]
pub(crate) struct MadeElement {
    pub(crate) kind: ElementKind,
    pub(crate) name: ArcStr,
    pub(crate) shapes: Vec<Shape>,
    pub(crate) opts: ElementOptions,
}

/// A pin connection queued by [`MakeContext::connect`].
#[derive(Debug, Clone)]
pub(crate) struct MadeConnection {
    pub(crate) pin: ArcStr,
    pub(crate) other: ComponentId,
    pub(crate) other_pin: ArcStr,
}

/// Everything a successful build produced.
#[derive(Debug, Clone, Default)]
pub(crate) struct Made {
    pub(crate) elements: Vec<MadeElement>,
    pub(crate) pins: IndexMap<ArcStr, Pin>,
    pub(crate) connections: Vec<MadeConnection>,
}

/// The build environment handed to [`ComponentClass::make`].
///
/// Getters read parsed options and report missing or mistyped values as
/// [`Error::InvalidOption`]. Shapes and pins given in the local frame are
/// rotated by `orientation`, then moved to `(pos_x, pos_y)`.
pub struct MakeContext<'a> {
    id: ComponentId,
    name: ArcStr,
    options: ParsedOptions,
    components: &'a IndexMap<ComponentId, Component>,
    name_to_id: &'a IndexMap<ArcStr, ComponentId>,
    transformation: Transformation,
    chip: ArcStr,
    layer: i64,
    made: Made,
}

impl<'a> MakeContext<'a> {
    pub(crate) fn new(
        id: ComponentId,
        name: ArcStr,
        options: ParsedOptions,
        components: &'a IndexMap<ComponentId, Component>,
        name_to_id: &'a IndexMap<ArcStr, ComponentId>,
    ) -> Result<Self> {
        let mut ctx = Self {
            id,
            name,
            options,
            components,
            name_to_id,
            transformation: Transformation::identity(),
            chip: arcstr::literal!("main"),
            layer: 1,
            made: Made::default(),
        };
        let origin = Point::new(ctx.length("pos_x")?, ctx.length("pos_y")?);
        ctx.transformation = Transformation::from_opts(origin, ctx.number("orientation")?);
        ctx.chip = ctx.text("chip")?;
        ctx.layer = ctx.integer("layer")?;
        Ok(ctx)
    }

    pub(crate) fn finish(self) -> Made {
        self.made
    }

    /// The ID of the component being built.
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// The name of the component being built.
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The chip named by the `chip` option.
    pub fn chip(&self) -> &ArcStr {
        &self.chip
    }

    /// The layer named by the `layer` option.
    pub fn layer(&self) -> i64 {
        self.layer
    }

    /// The local-to-design transformation.
    pub fn transformation(&self) -> Transformation {
        self.transformation
    }

    /// Replaces the local-to-design transformation.
    ///
    /// Classes that compute design coordinates directly, such as routes,
    /// set the identity.
    pub fn set_transformation(&mut self, transformation: Transformation) {
        self.transformation = transformation;
    }

    /// A parsed option.
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    fn invalid(&self, key: &str, expected: &'static str) -> Error {
        Error::InvalidOption {
            component: self.name.clone(),
            option: key.into(),
            expected,
            found: self
                .options
                .get(key)
                .map(ToString::to_string)
                .unwrap_or_else(|| "<missing>".to_string()),
        }
    }

    /// A length option in database units.
    pub fn length(&self, key: &str) -> Result<i64> {
        self.option(key)
            .and_then(Value::as_db)
            .ok_or_else(|| self.invalid(key, "a length"))
    }

    /// A unitless number option.
    pub fn number(&self, key: &str) -> Result<f64> {
        self.option(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.invalid(key, "a number"))
    }

    /// An integer option.
    pub fn integer(&self, key: &str) -> Result<i64> {
        self.option(key)
            .and_then(Value::as_number)
            .filter(|n| n.fract().is_zero())
            .and_then(|n| i64::try_from(n).ok())
            .ok_or_else(|| self.invalid(key, "an integer"))
    }

    /// A text option.
    pub fn text(&self, key: &str) -> Result<ArcStr> {
        match self.option(key) {
            Some(Value::Text(t)) => Ok(t.clone()),
            Some(Value::Number(n)) => Ok(arcstr::format!("{}", n.normalize())),
            _ => Err(self.invalid(key, "text")),
        }
    }

    /// A boolean option.
    pub fn flag(&self, key: &str) -> Result<bool> {
        self.option(key)
            .and_then(Value::as_bool)
            .ok_or_else(|| self.invalid(key, "a boolean"))
    }

    /// A list of `[x, y]` length pairs in database units.
    pub fn points(&self, key: &str) -> Result<Vec<Point>> {
        let list = self
            .option(key)
            .and_then(Value::as_list)
            .ok_or_else(|| self.invalid(key, "a list of points"))?;
        list.iter()
            .map(|p| match p.as_list() {
                Some([x, y]) => x
                    .as_db()
                    .zip(y.as_db())
                    .map(|(x, y)| Point::new(x, y))
                    .ok_or_else(|| self.invalid(key, "a list of points")),
                _ => Err(self.invalid(key, "a list of points")),
            })
            .collect()
    }

    /// Queues geometry on the component's chip and layer.
    ///
    /// Shapes are in the local frame.
    pub fn add_qgeometry(
        &mut self,
        kind: ElementKind,
        name: impl Into<ArcStr>,
        shapes: Vec<Shape>,
        subtract: bool,
        helper: bool,
    ) {
        let opts = ElementOptions {
            subtract,
            helper,
            layer: self.layer,
            chip: self.chip.clone(),
            ..Default::default()
        };
        self.add_qgeometry_with(kind, name, shapes, opts);
    }

    /// Queues geometry with explicit row settings.
    pub fn add_qgeometry_with(
        &mut self,
        kind: ElementKind,
        name: impl Into<ArcStr>,
        shapes: Vec<Shape>,
        opts: ElementOptions,
    ) {
        let shapes = shapes
            .into_iter()
            .map(|s| s.transform(self.transformation))
            .collect();
        self.made.elements.push(MadeElement {
            kind,
            name: name.into(),
            shapes,
            opts,
        });
    }

    /// Adds a pin on the component's chip.
    ///
    /// `points` are in the local frame. See [`Pin::new`] for the meaning of
    /// `input_as_norm`. A pin with the same name is replaced.
    pub fn add_pin(
        &mut self,
        name: impl Into<ArcStr>,
        points: [Point; 2],
        width: i64,
        input_as_norm: bool,
        gap: Option<i64>,
    ) -> Result<&Pin> {
        let name = name.into();
        let t = self.transformation;
        let points = points.map(|p| p.transform(t));
        let pin = Pin::new(
            name.clone(),
            points,
            width,
            input_as_norm,
            self.chip.clone(),
            gap,
            self.id,
        )?;
        self.made.pins.insert(name.clone(), pin);
        Ok(&self.made.pins[&name])
    }

    /// Resolves a `pin_inputs` entry to the referenced component and pin.
    pub fn pin_input(&self, key: &str) -> Result<(ComponentId, &'a Pin)> {
        let malformed = || self.invalid("pin_inputs", "component and pin names");
        let entry = self
            .option("pin_inputs")
            .and_then(Value::as_map)
            .and_then(|m| m.get(key))
            .and_then(Value::as_map)
            .ok_or_else(malformed)?;
        let field = |f: &str| -> Result<ArcStr> {
            match entry.get(f) {
                Some(Value::Text(t)) => Ok(t.clone()),
                Some(Value::Number(n)) => Ok(arcstr::format!("{}", n.normalize())),
                _ => Err(malformed()),
            }
        };
        let (component, pin) = (field("component")?, field("pin")?);
        let id = *self
            .name_to_id
            .get(&component)
            .ok_or_else(|| Error::ComponentNotFound(component.clone()))?;
        let pin = self
            .components
            .get(&id)
            .and_then(|c| c.pins.get(&pin))
            .ok_or_else(|| Error::Make {
                component: self.name.clone(),
                message: format!("pin `{component}.{pin}` does not exist"),
            })?;
        Ok((id, pin))
    }

    /// Queues a net between one of this component's pins and a pin of
    /// another component.
    pub fn connect(&mut self, pin: impl Into<ArcStr>, other: ComponentId, other_pin: impl Into<ArcStr>) {
        self.made.connections.push(MadeConnection {
            pin: pin.into(),
            other,
            other_pin: other_pin.into(),
        });
    }

    /// Shorthand for a build failure of this component.
    pub fn fail(&self, message: impl Into<String>) -> Error {
        Error::Make {
            component: self.name.clone(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests;
