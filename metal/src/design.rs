//! The root design model.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use chrono::{DateTime, Utc};
use geometry::prelude::*;
use indexmap::{IndexMap, IndexSet};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::component::pin::{check_pin_inputs, pin_inputs};
use crate::component::{ClassRegistry, Component, ComponentClass, Made, MakeContext, Status};
use crate::error::{Error, Result};
use crate::id::{ComponentId, NetId};
use crate::layer_stack::{LayerRow, LayerStack};
use crate::naming::NameCounters;
use crate::net::NetTable;
use crate::parse::{merge_options, options, parse_raw, to_db_units, Options, RawValue};
use crate::qgeometry::GeometryTables;
use crate::renderer::Renderer;

/// The number of entries kept in a [`BuildLog`].
pub const BUILD_LOG_CAPACITY: usize = 100;

/// The chip arrangement a design was created for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// One chip, one metal layer.
    #[default]
    Planar,
    /// One chip with a multi-layer stack.
    MultiPlanar,
    /// Two chips facing each other.
    FlipChip,
}

/// A physical chip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chip {
    /// The substrate material.
    pub material: ArcStr,
    /// The first layer number on this chip.
    pub layer_start: i64,
    /// The last layer number on this chip.
    pub layer_end: i64,
    /// Raw size data: `center_{x,y,z}`, `size_{x,y,z}` and optionally
    /// `sample_holder_{top,bottom}`.
    pub size: Options,
}

impl Chip {
    fn new(material: &str, center_z: &str, size: (&str, &str, &str)) -> Self {
        Self {
            material: material.into(),
            layer_start: 0,
            layer_end: 2048,
            size: options([
                ("center_x", "0.0mm"),
                ("center_y", "0.0mm"),
                ("center_z", center_z),
                ("size_x", size.0),
                ("size_y", size.1),
                ("size_z", size.2),
            ]),
        }
    }

    fn with_sample_holder(mut self) -> Self {
        self.size.insert("sample_holder_top".into(), "890um".into());
        self.size.insert("sample_holder_bottom".into(), "1650um".into());
        self
    }
}

/// The parsed size of a chip, in database units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipDims {
    /// Center x.
    pub center_x: i64,
    /// Center y.
    pub center_y: i64,
    /// Center z, the height of the ground plane.
    pub center_z: i64,
    /// Width.
    pub size_x: i64,
    /// Height.
    pub size_y: i64,
    /// Substrate thickness. Negative values extend downward.
    pub size_z: i64,
}

impl ChipDims {
    /// The chip footprint.
    pub fn rect(&self) -> Rect {
        Rect::from_center(
            Point::new(self.center_x, self.center_y),
            self.size_x,
            self.size_y,
        )
    }
}

/// The outcome of [`Design::get_x_y_for_chip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChipLookup {
    /// The chip exists and has numeric size data.
    Ok,
    /// The chip does not exist.
    Missing,
    /// The chip's size data is missing or not numeric.
    BadSize,
}

impl ChipLookup {
    /// The numeric code: 0, 1 or 2.
    pub const fn code(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Missing => 1,
            Self::BadSize => 2,
        }
    }
}

/// How a component selection relates to the design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionCase {
    /// A strict subset of the components.
    Subset,
    /// Every component.
    All,
    /// At least one name is not a component.
    Missing,
}

impl SelectionCase {
    /// The numeric code: 0, 1 or 2.
    pub const fn code(&self) -> u8 {
        match self {
            Self::Subset => 0,
            Self::All => 1,
            Self::Missing => 2,
        }
    }
}

/// The outcome of a component build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    /// The build succeeded.
    Success,
    /// The build failed.
    Error,
}

/// One [`BuildLog`] entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildLogEntry {
    /// When the build finished.
    pub time: DateTime<Utc>,
    /// The component that was built.
    pub component: ArcStr,
    /// Success or failure.
    pub outcome: BuildOutcome,
    /// The error message, or empty on success.
    pub message: String,
}

/// The most recent component builds, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildLog {
    entries: VecDeque<BuildLogEntry>,
}

impl BuildLog {
    fn push(&mut self, component: ArcStr, outcome: BuildOutcome, message: String) {
        if self.entries.len() == BUILD_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(BuildLogEntry {
            time: Utc::now(),
            component,
            outcome,
            message,
        });
    }

    /// The entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &BuildLogEntry> {
        self.entries.iter()
    }

    /// The newest entry.
    pub fn last(&self) -> Option<&BuildLogEntry> {
        self.entries.back()
    }

    /// The number of failed builds in the log.
    pub fn num_errors(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == BuildOutcome::Error)
            .count()
    }
}

/// A design: components, nets, geometry tables, chips and a layer stack.
#[derive(Debug, Clone)]
pub struct Design {
    pub(crate) name: ArcStr,
    pub(crate) variant: Variant,
    pub(crate) notes: String,
    pub(crate) components: IndexMap<ComponentId, Component>,
    pub(crate) name_to_id: IndexMap<ArcStr, ComponentId>,
    latest_id: ComponentId,
    pub(crate) net_info: NetTable,
    pub(crate) qgeometry: GeometryTables,
    pub(crate) chips: IndexMap<ArcStr, Chip>,
    pub(crate) variables: Options,
    pub(crate) layer_stack: LayerStack,
    build_log: BuildLog,
    overwrite_enabled: bool,
    registry: ClassRegistry,
    names: NameCounters,
    renderers: IndexSet<ArcStr>,
}

fn default_variables() -> Options {
    options([("cpw_width", "10um"), ("cpw_gap", "6um")])
}

impl Design {
    fn with_chips(variant: Variant, chips: IndexMap<ArcStr, Chip>, layer_stack: LayerStack) -> Self {
        Self {
            name: arcstr::literal!("my_design"),
            variant,
            notes: String::new(),
            components: IndexMap::new(),
            name_to_id: IndexMap::new(),
            latest_id: ComponentId::new(),
            net_info: NetTable::new(),
            qgeometry: GeometryTables::new(),
            chips,
            variables: default_variables(),
            layer_stack,
            build_log: BuildLog::default(),
            overwrite_enabled: false,
            registry: ClassRegistry::default(),
            names: NameCounters::new(),
            renderers: IndexSet::new(),
        }
    }

    /// A single 9mm x 6mm silicon chip named `main`.
    pub fn planar() -> Self {
        let main = Chip::new("silicon", "0.0mm", ("9mm", "6mm", "-750um")).with_sample_holder();
        Self::with_chips(
            Variant::Planar,
            IndexMap::from([(arcstr::literal!("main"), main)]),
            LayerStack::default(),
        )
    }

    /// A single 9mm x 7mm chip with the given layer stack.
    pub fn multi_planar(layer_stack: LayerStack) -> Self {
        let main = Chip::new("silicon", "0.0mm", ("9mm", "7mm", "-750um")).with_sample_holder();
        Self::with_chips(
            Variant::MultiPlanar,
            IndexMap::from([(arcstr::literal!("main"), main)]),
            layer_stack,
        )
    }

    /// Two 9mm x 9mm chips, `C_chip` below and `Q_chip` above.
    ///
    /// The sample holder is set through design variables.
    pub fn flip_chip() -> Self {
        let chips = IndexMap::from([
            (
                arcstr::literal!("C_chip"),
                Chip::new("silicon", "0.0mm", ("9mm", "9mm", "-280um")),
            ),
            (
                arcstr::literal!("Q_chip"),
                Chip::new("silicon", "20um", ("9mm", "9mm", "280um")),
            ),
        ]);
        let mut design = Self::with_chips(Variant::FlipChip, chips, LayerStack::flip_chip());
        design.set_variable("sample_holder_top", "890um");
        design.set_variable("sample_holder_bottom", "1650um");
        design
    }

    /// Creates a design of the given variant with its default layer stack.
    pub fn from_variant(variant: Variant) -> Self {
        match variant {
            Variant::Planar => Self::planar(),
            Variant::MultiPlanar => Self::multi_planar(LayerStack::default()),
            Variant::FlipChip => Self::flip_chip(),
        }
    }

    /// Applies the `design` section of a configuration.
    pub fn apply_config(&mut self, config: &config::Config) {
        self.overwrite_enabled = config.design.overwrite_enabled;
        if let Some(path) = &config.design.layer_stack {
            self.layer_stack = LayerStack::load_or_default(Some(path));
        }
    }

    /// The design name.
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// Sets the design name.
    pub fn set_name(&mut self, name: impl Into<ArcStr>) {
        self.name = name.into();
    }

    /// The chip arrangement.
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Free-form notes.
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Sets the notes.
    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    /// Whether adding a component under a used name replaces the old one.
    pub fn overwrite_enabled(&self) -> bool {
        self.overwrite_enabled
    }

    /// Enables or disables overwriting.
    pub fn set_overwrite_enabled(&mut self, enabled: bool) {
        self.overwrite_enabled = enabled;
    }

    /// The component classes available to [`Design::add_component`].
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Mutable access to the class registry.
    pub fn registry_mut(&mut self) -> &mut ClassRegistry {
        &mut self.registry
    }

    /// The net table.
    pub fn net_info(&self) -> &NetTable {
        &self.net_info
    }

    /// The geometry tables.
    pub fn qgeometry(&self) -> &GeometryTables {
        &self.qgeometry
    }

    /// The layer stack.
    pub fn layer_stack(&self) -> &LayerStack {
        &self.layer_stack
    }

    /// Replaces the layer stack.
    pub fn set_layer_stack(&mut self, layer_stack: LayerStack) {
        self.layer_stack = layer_stack;
    }

    /// The build log.
    pub fn build_log(&self) -> &BuildLog {
        &self.build_log
    }

    /// The chips, by name.
    pub fn chips(&self) -> &IndexMap<ArcStr, Chip> {
        &self.chips
    }

    /// Adds or replaces a chip.
    pub fn set_chip(&mut self, name: impl Into<ArcStr>, chip: Chip) {
        self.chips.insert(name.into(), chip);
    }

    /// The chip names, in definition order.
    pub fn chip_names(&self) -> Vec<ArcStr> {
        self.chips.keys().cloned().collect()
    }

    /// The components, in insertion order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// The number of components.
    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Looks up a component by name.
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.find_id(name).and_then(|id| self.components.get(&id))
    }

    /// Looks up a component by ID.
    pub fn component_by_id(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(&id)
    }

    /// The ID of the named component.
    pub fn find_id(&self, name: &str) -> Option<ComponentId> {
        self.name_to_id.get(name).copied()
    }

    /// The design variables.
    pub fn variables(&self) -> &Options {
        &self.variables
    }

    /// A design variable.
    pub fn get_variable(&self, name: &str) -> Option<&RawValue> {
        self.variables.get(name)
    }

    /// Sets a design variable. Components see the new value on rebuild.
    pub fn set_variable(&mut self, name: impl Into<ArcStr>, value: impl Into<RawValue>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Removes a design variable.
    pub fn delete_variable(&mut self, name: &str) -> Option<RawValue> {
        self.variables.shift_remove(name)
    }

    /// Adds a component of the given class.
    ///
    /// Without a name, one is generated from the class's short name. With
    /// `make`, the component is built right away; a failed build leaves the
    /// component in [`Status::Failed`] and still returns its ID.
    pub fn add_component(
        &mut self,
        class: &str,
        name: Option<&str>,
        overrides: Options,
        make: bool,
    ) -> Result<ComponentId> {
        let class = self.registry.get(class)?;
        let name: ArcStr = match name {
            Some(name) => name.into(),
            None => {
                let in_use = &self.name_to_id;
                self.names
                    .next_name(class.short_name(), |n| in_use.contains_key(n))
            }
        };

        let mut opts = class.template_options();
        merge_options(&mut opts, &overrides);
        check_pin_inputs(&opts, |n| self.component(n)).map_err(|source| {
            tracing::warn!(component.name = %name, error = %source, "rejected pin inputs");
            Error::PinInput {
                component: name.clone(),
                source,
            }
        })?;

        if self.name_to_id.contains_key(&name) {
            if !self.overwrite_enabled {
                tracing::warn!(component.name = %name, "component name in use");
                return Err(Error::NameInUse(name));
            }
            self.delete_component(&name)?;
        }

        let id = self.latest_id.alloc();
        self.components.insert(
            id,
            Component::new(id, name.clone(), class.class_name().into(), opts),
        );
        self.name_to_id.insert(name.clone(), id);
        tracing::info!(component.id = %id, component.name = %name, class = class.class_name(), "added component");

        if make {
            // Failures are recorded on the component and in the build log.
            let _ = self.rebuild_component(id);
        }
        Ok(id)
    }

    /// Replaces options of an existing component. Rebuild to see the effect.
    pub fn update_options(&mut self, name: &str, overrides: &Options) -> Result<()> {
        let id = self
            .find_id(name)
            .ok_or_else(|| Error::ComponentNotFound(name.into()))?;
        if let Some(comp) = self.components.get_mut(&id) {
            merge_options(&mut comp.options, overrides);
        }
        Ok(())
    }

    /// Builds a component, replacing the rows, pins and nets of any previous
    /// build.
    pub fn rebuild_component(&mut self, id: ComponentId) -> Result<()> {
        let comp = self
            .components
            .get(&id)
            .ok_or(Error::ComponentIdNotFound(id))?;
        let class = self.registry.get(&comp.class_name)?;
        let (name, made) = (comp.name.clone(), comp.made);

        if made {
            self.qgeometry.delete_component_id(id);
            self.disconnect_component(id);
        }

        let result = match self.make_component(id, &name, class.as_ref()) {
            Ok(made) => self.commit(id, made),
            Err(e) => Err(e),
        };
        let Some(comp) = self.components.get_mut(&id) else {
            return Err(Error::ComponentIdNotFound(id));
        };
        match result {
            Ok(()) => {
                comp.status = Status::Good;
                comp.made = true;
                tracing::debug!(component.id = %id, component.name = %name, "built component");
                self.build_log
                    .push(name, BuildOutcome::Success, String::new());
                Ok(())
            }
            Err(e) => {
                comp.status = Status::Failed;
                comp.made = false;
                comp.pins.clear();
                self.qgeometry.delete_component_id(id);
                self.disconnect_component(id);
                tracing::error!(component.id = %id, component.name = %name, error = %e, "component build failed");
                self.build_log
                    .push(name, BuildOutcome::Error, e.to_string());
                Err(e)
            }
        }
    }

    fn make_component(
        &self,
        id: ComponentId,
        name: &ArcStr,
        class: &dyn ComponentClass,
    ) -> Result<Made> {
        let raw = self
            .components
            .get(&id)
            .map(|c| &c.options)
            .ok_or(Error::ComponentIdNotFound(id))?;
        check_pin_inputs(raw, |n| self.component(n)).map_err(|source| Error::PinInput {
            component: name.clone(),
            source,
        })?;
        let parsed = crate::parse::parse_options(raw, &self.variables)?;
        let mut ctx = MakeContext::new(id, name.clone(), parsed, &self.components, &self.name_to_id)?;
        class.make(&mut ctx)?;
        let made = ctx.finish();
        let declared = class.element_kinds();
        if let Some(element) = made.elements.iter().find(|e| !declared.contains(&e.kind)) {
            return Err(Error::Make {
                component: name.clone(),
                message: format!(
                    "element `{}` was written to the {} table, which class `{}` does not declare",
                    element.name,
                    element.kind,
                    class.class_name()
                ),
            });
        }
        Ok(made)
    }

    fn commit(&mut self, id: ComponentId, made: Made) -> Result<()> {
        for element in made.elements {
            self.qgeometry.add_qgeometry(
                element.kind,
                id,
                [(element.name, element.shapes)],
                &element.opts,
            )?;
        }
        if let Some(comp) = self.components.get_mut(&id) {
            comp.pins = made.pins;
        }
        for conn in made.connections {
            if self.connect_ids(id, &conn.pin, conn.other, &conn.other_pin).is_zero() {
                return Err(Error::Make {
                    component: self
                        .components
                        .get(&id)
                        .map(|c| c.name.clone())
                        .unwrap_or_default(),
                    message: format!("could not connect pin `{}`", conn.pin),
                });
            }
        }
        Ok(())
    }

    /// Rebuilds every component in ID order, returning the number of failures.
    pub fn rebuild(&mut self) -> usize {
        let ids: Vec<_> = self.components.keys().copied().collect();
        let failures = ids
            .into_iter()
            .filter(|id| self.rebuild_component(*id).is_err())
            .count();
        tracing::info!(components = self.components.len(), failures, "rebuilt design");
        failures
    }

    /// Removes a component with its rows and nets.
    ///
    /// Pins that were connected to it become unconnected.
    pub fn delete_component(&mut self, name: &str) -> Result<()> {
        let id = self
            .find_id(name)
            .ok_or_else(|| Error::ComponentNotFound(name.into()))?;
        let rows = self.qgeometry.delete_component_id(id);
        self.disconnect_component(id);
        self.name_to_id.shift_remove(name);
        self.components.shift_remove(&id);
        tracing::info!(component.id = %id, component.name = name, rows, "deleted component");
        Ok(())
    }

    /// Removes every component, net and row, and restarts numbering.
    pub fn delete_all_components(&mut self) {
        self.components.clear();
        self.name_to_id.clear();
        self.net_info.clear();
        self.qgeometry.clear_all_tables();
        self.names.reset();
        self.latest_id = ComponentId::new();
        tracing::info!("deleted all components");
    }

    /// Renames a component, keeping its ID.
    pub fn rename_component(&mut self, id: ComponentId, new_name: &str) -> Result<()> {
        if self.name_to_id.contains_key(new_name) {
            return Err(Error::NameInUse(new_name.into()));
        }
        let comp = self
            .components
            .get_mut(&id)
            .ok_or(Error::ComponentIdNotFound(id))?;
        let old = std::mem::replace(&mut comp.name, new_name.into());
        self.name_to_id.shift_remove(&old);
        self.name_to_id.insert(new_name.into(), id);
        self.qgeometry.rename_component(id, &old, new_name);
        tracing::info!(component.id = %id, old = %old, new = new_name, "renamed component");
        Ok(())
    }

    /// Connects two pins by component name.
    ///
    /// Returns [`NetId::UNCONNECTED`] with a warning if a component or pin
    /// does not exist or a pin is already in use.
    pub fn connect_pins(&mut self, comp1: &str, pin1: &str, comp2: &str, pin2: &str) -> NetId {
        match (self.find_id(comp1), self.find_id(comp2)) {
            (Some(a), Some(b)) => self.connect_ids(a, pin1, b, pin2),
            _ => {
                tracing::warn!(comp1, comp2, "cannot connect pins of a missing component");
                NetId::UNCONNECTED
            }
        }
    }

    fn connect_ids(&mut self, a: ComponentId, pin_a: &str, b: ComponentId, pin_b: &str) -> NetId {
        let has_pin = |id: ComponentId, pin: &str| {
            self.components
                .get(&id)
                .is_some_and(|c| c.pins.contains_key(pin))
        };
        if !has_pin(a, pin_a) || !has_pin(b, pin_b) {
            tracing::warn!(%a, pin_a, %b, pin_b, "cannot connect a missing pin");
            return NetId::UNCONNECTED;
        }
        let net = self.net_info.add_pins_to_table(a, pin_a, b, pin_b);
        if !net.is_zero() {
            for (id, pin) in [(a, pin_a), (b, pin_b)] {
                if let Some(p) = self.components.get_mut(&id).and_then(|c| c.pins.get_mut(pin)) {
                    p.net_id = net;
                }
            }
        }
        net
    }

    /// Removes the nets of a component and resets every pin that was on them.
    fn disconnect_component(&mut self, id: ComponentId) {
        let nets: BTreeSet<NetId> = self
            .net_info
            .net_info()
            .iter()
            .filter(|row| row.component_id == id)
            .map(|row| row.net_id)
            .collect();
        let members: Vec<_> = nets
            .iter()
            .flat_map(|net| self.net_info.get_components_and_pins_for_netid(*net))
            .collect();
        self.net_info.delete_all_pins_for_component(id);
        for (comp, pin) in members {
            if let Some(p) = self
                .components
                .get_mut(&comp)
                .and_then(|c| c.pins.get_mut(&pin))
            {
                p.net_id = NetId::UNCONNECTED;
            }
        }
    }

    /// The bounding box of a component's rows across all tables.
    ///
    /// A component with no rows has the zero box at the origin.
    pub fn qgeometry_bounds(&self, id: ComponentId) -> Rect {
        self.qgeometry
            .get_component_bounds(id)
            .unwrap_or_else(|| Rect::from_sides(0, 0, 0, 0))
    }

    /// Classifies a selection of component names.
    ///
    /// An empty selection, or one naming every component, selects all
    /// components and returns no IDs.
    pub fn get_unique_component_ids(&self, selection: &[&str]) -> (Vec<ComponentId>, SelectionCase) {
        if selection.is_empty() {
            return (Vec::new(), SelectionCase::All);
        }
        let unique: IndexSet<&str> = selection.iter().copied().collect();
        let mut ids = Vec::with_capacity(unique.len());
        for name in &unique {
            match self.find_id(name) {
                Some(id) => ids.push(id),
                None => {
                    tracing::warn!(component.name = %name, "selected component does not exist");
                    return (Vec::new(), SelectionCase::Missing);
                }
            }
        }
        if ids.len() == self.components.len() {
            (Vec::new(), SelectionCase::All)
        } else {
            (ids, SelectionCase::Subset)
        }
    }

    /// Registers a renderer's columns on the geometry tables.
    ///
    /// Existing rows take the column defaults.
    pub fn register_renderer(&mut self, renderer: &dyn Renderer) {
        for (kind, columns) in renderer.element_table_data() {
            for (column, default) in columns {
                self.qgeometry
                    .add_renderer_columns(renderer.name(), kind, &column, default);
            }
        }
        if self.renderers.insert(renderer.name().into()) {
            tracing::debug!(renderer = renderer.name(), "registered renderer");
        }
    }

    /// The names of registered renderers.
    pub fn renderers(&self) -> impl Iterator<Item = &ArcStr> {
        self.renderers.iter()
    }

    /// The raw size table of a chip.
    pub fn get_chip_size(&self, chip: &str) -> Option<&Options> {
        self.chips.get(chip).map(|c| &c.size)
    }

    /// A parsed chip size entry, in millimeters.
    pub fn chip_size_value(&self, chip: &str, key: &str) -> Option<Decimal> {
        let raw = self.get_chip_size(chip)?.get(key)?;
        parse_raw(raw, &self.variables).ok()?.as_number()
    }

    /// The z coordinate of a chip's ground plane, in millimeters.
    pub fn get_chip_z(&self, chip: &str) -> Option<Decimal> {
        self.chip_size_value(chip, "center_z")
    }

    /// The first layer number on a chip.
    pub fn get_chip_layer(&self, chip: &str) -> Option<i64> {
        self.chips.get(chip).map(|c| c.layer_start)
    }

    /// The chip's size data in database units.
    pub fn chip_dims(&self, chip: &str) -> Result<ChipDims, ChipLookup> {
        if !self.chips.contains_key(chip) {
            return Err(ChipLookup::Missing);
        }
        let get = |key: &str| {
            self.chip_size_value(chip, key)
                .map(to_db_units)
                .ok_or(ChipLookup::BadSize)
        };
        Ok(ChipDims {
            center_x: get("center_x")?,
            center_y: get("center_y")?,
            center_z: get("center_z")?,
            size_x: get("size_x")?,
            size_y: get("size_y")?,
            size_z: get("size_z")?,
        })
    }

    /// The footprint of a chip.
    pub fn get_x_y_for_chip(&self, chip: &str) -> (Option<Rect>, ChipLookup) {
        match self.chip_dims(chip) {
            Ok(dims) => (Some(dims.rect()), ChipLookup::Ok),
            Err(code) => {
                tracing::warn!(chip, code = code.code(), "no usable chip size");
                (None, code)
            }
        }
    }

    /// Validates the design. See [`crate::validation`].
    pub fn validate(&self) -> diagnostics::IssueSet<crate::validation::DesignIssue> {
        crate::validation::validate_design(self)
    }

    /// Writes the design to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(&self.to_file())?;
        std::fs::write(path, text)?;
        tracing::info!(path = %path.display(), "saved design");
        Ok(())
    }

    /// Reads a design from a TOML file.
    ///
    /// A relative `layer_stack` path is resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let file: DesignFile = toml::from_str(&text)?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let design = Self::from_file(file, &base)?;
        tracing::info!(path = %path.display(), components = design.num_components(), "loaded design");
        Ok(design)
    }

    /// Builds a design from a parsed design file.
    ///
    /// Components are added and built in file order, so a route must come
    /// after the components it connects.
    pub fn from_file(file: DesignFile, base: &Path) -> Result<Self> {
        let header = file.design;
        let mut design = Self::from_variant(header.variant);
        design.name = header.name;
        design.notes = header.notes;
        design.overwrite_enabled = header.overwrite;
        if !file.layers.is_empty() {
            design.layer_stack = LayerStack::from_rows(file.layers);
        } else if let Some(stack) = header.layer_stack {
            design.layer_stack = LayerStack::from_path(base.join(stack))?;
        }
        merge_options(&mut design.variables, &file.variables);
        for chip in file.chips {
            match design.chips.get_mut(&chip.name) {
                Some(existing) => {
                    if let Some(material) = chip.material {
                        existing.material = material;
                    }
                    merge_options(&mut existing.size, &chip.size);
                }
                None => {
                    let mut new = Chip::new("silicon", "0.0mm", ("9mm", "6mm", "-750um"));
                    if let Some(material) = chip.material {
                        new.material = material;
                    }
                    merge_options(&mut new.size, &chip.size);
                    design.chips.insert(chip.name, new);
                }
            }
        }
        for entry in file.components {
            design.add_component(&entry.class, Some(&entry.name), entry.options, true)?;
        }
        for conn in file.connections {
            if design
                .connect_pins(&conn.component_a, &conn.pin_a, &conn.component_b, &conn.pin_b)
                .is_zero()
            {
                return Err(Error::DesignFile(format!(
                    "could not connect {}.{} to {}.{}",
                    conn.component_a, conn.pin_a, conn.component_b, conn.pin_b
                )));
            }
        }
        Ok(design)
    }

    /// Returns `true` if the net between two pins was made by a component
    /// from its `pin_inputs`.
    fn is_made_connection(&self, a: (ComponentId, &str), b: (ComponentId, &str)) -> bool {
        let references = |from: ComponentId, to: (ComponentId, &str)| {
            let (Some(from), Some(to_comp)) = (self.components.get(&from), self.components.get(&to.0)) else {
                return false;
            };
            pin_inputs(&from.options).is_ok_and(|inputs| {
                inputs
                    .iter()
                    .any(|i| i.component == to_comp.name && i.pin == to.1)
            })
        };
        references(a.0, b) || references(b.0, a)
    }

    /// Converts the design into its file form.
    pub fn to_file(&self) -> DesignFile {
        let name_of = |id: ComponentId| {
            self.components
                .get(&id)
                .map(|c| c.name.clone())
                .unwrap_or_default()
        };
        let mut connections = Vec::new();
        for net in self.net_info.net_ids() {
            let members = self.net_info.get_components_and_pins_for_netid(net);
            let [(a, pin_a), (b, pin_b)] = members.as_slice() else {
                continue;
            };
            if self.is_made_connection((*a, pin_a), (*b, pin_b)) {
                continue;
            }
            connections.push(ConnectionEntry {
                component_a: name_of(*a),
                pin_a: pin_a.clone(),
                component_b: name_of(*b),
                pin_b: pin_b.clone(),
            });
        }

        DesignFile {
            design: DesignHeader {
                name: self.name.clone(),
                variant: self.variant,
                overwrite: self.overwrite_enabled,
                notes: self.notes.clone(),
                layer_stack: None,
            },
            variables: self.variables.clone(),
            chips: self
                .chips
                .iter()
                .map(|(name, chip)| ChipEntry {
                    name: name.clone(),
                    material: Some(chip.material.clone()),
                    size: chip.size.clone(),
                })
                .collect(),
            components: self
                .components
                .values()
                .map(|c| ComponentEntry {
                    name: c.name.clone(),
                    class: c.class_name.clone(),
                    options: c.options.clone(),
                })
                .collect(),
            connections,
            layers: self.layer_stack.rows().to_vec(),
        }
    }
}

/// The `[design]` table of a design file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignHeader {
    /// The design name.
    pub name: ArcStr,
    /// The chip arrangement.
    #[serde(default)]
    pub variant: Variant,
    /// Replace components added under a used name.
    #[serde(default)]
    pub overwrite: bool,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    /// A layer stack file, used when the file has no `[[layers]]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_stack: Option<PathBuf>,
}

/// A `[[chips]]` entry, overriding or adding a chip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipEntry {
    /// The chip name.
    pub name: ArcStr,
    /// The substrate material.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<ArcStr>,
    /// Size entries to override.
    #[serde(default)]
    pub size: Options,
}

/// A `[[components]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// The component name.
    pub name: ArcStr,
    /// The component class.
    pub class: ArcStr,
    /// Option overrides.
    #[serde(default)]
    pub options: Options,
}

/// A `[[connections]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    /// The first component.
    pub component_a: ArcStr,
    /// The pin on the first component.
    pub pin_a: ArcStr,
    /// The second component.
    pub component_b: ArcStr,
    /// The pin on the second component.
    pub pin_b: ArcStr,
}

/// A design file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignFile {
    /// Name, variant and flags.
    pub design: DesignHeader,
    /// Design variables.
    #[serde(default)]
    pub variables: Options,
    /// Chip overrides.
    #[serde(default)]
    pub chips: Vec<ChipEntry>,
    /// Components, in build order.
    #[serde(default)]
    pub components: Vec<ComponentEntry>,
    /// Explicit pin connections.
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
    /// An inline layer stack.
    #[serde(default)]
    pub layers: Vec<LayerRow>,
}
