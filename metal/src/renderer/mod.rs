//! Simulator backends that export the geometry tables of a design.
//!
//! Every renderer goes through the same preparation: resolve the selection,
//! check the requested pins, compute the render box and collect the rows.
//! Output is returned as text files keyed by file name so callers decide
//! where to write them.

use std::fmt::Display;

use arcstr::ArcStr;
use diagnostics::{Diagnostic, IssueSet, Severity};
use geometry::prelude::*;
use indexmap::{IndexMap, IndexSet};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::bounds::TableBounds;
use crate::component::pin::Pin;
use crate::design::{Design, SelectionCase};
use crate::id::ComponentId;
use crate::parse::{from_db_units, merge_options, parse_options, Options, ParsedOptions, Value};
use crate::qgeometry::{ElementKind, QGeometryRow};

pub mod ansys;
pub mod elmer;
pub mod gmsh;

/// An error that aborts a render before any output is produced.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The selection names components that do not exist.
    #[error("selection names unknown components: {}", .0.join(", "))]
    InvalidSelection(Vec<ArcStr>),
    /// An open pin or port names a component or pin that does not exist.
    #[error("component `{component}` has no pin `{pin}`")]
    InvalidPin {
        /// The component name.
        component: ArcStr,
        /// The pin name.
        pin: ArcStr,
    },
    /// Geometry lies on a chip the design does not define.
    #[error("element `{element}` of `{component}` is on unknown chip `{chip}`")]
    UnknownChip {
        /// The chip name.
        chip: ArcStr,
        /// The component name.
        component: ArcStr,
        /// The element name.
        element: ArcStr,
    },
    /// The renderer has not been started.
    #[error("renderer `{0}` has not been started")]
    NotInitiated(&'static str),
    /// A renderer option is missing or malformed.
    #[error("option `{option}` of renderer `{renderer}` is invalid: `{value}`")]
    InvalidOption {
        /// The renderer name.
        renderer: &'static str,
        /// The option path, dot separated.
        option: String,
        /// The offending value.
        value: String,
    },
}

/// What to render and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Component names to render. Empty renders everything.
    pub selection: Vec<ArcStr>,
    /// `(component, pin)` pairs that get an endcap cut into the ground.
    pub open_pins: Vec<(ArcStr, ArcStr)>,
    /// Fit the simulation box around the geometry instead of using chip sizes.
    pub box_plus_buffer: bool,
    /// `(component, pin, impedance)` lumped ports.
    pub port_list: Vec<(ArcStr, ArcStr, f64)>,
    /// `(component, element, impedance, draw_inductor)` junctions rendered as ports.
    pub jj_to_port: Vec<(ArcStr, ArcStr, f64, bool)>,
    /// `(component, element)` junctions left out of the render.
    pub ignored_jjs: Vec<(ArcStr, ArcStr)>,
    /// Leave out every junction.
    pub skip_junctions: bool,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            selection: Vec::new(),
            open_pins: Vec::new(),
            box_plus_buffer: true,
            port_list: Vec::new(),
            jj_to_port: Vec::new(),
            ignored_jjs: Vec::new(),
            skip_junctions: false,
        }
    }
}

impl RenderRequest {
    /// Renders the named components.
    pub fn select<S: Into<ArcStr>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.selection = names.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an open pin.
    pub fn open_pin(mut self, component: impl Into<ArcStr>, pin: impl Into<ArcStr>) -> Self {
        self.open_pins.push((component.into(), pin.into()));
        self
    }

    /// Adds a lumped port.
    pub fn port(
        mut self,
        component: impl Into<ArcStr>,
        pin: impl Into<ArcStr>,
        impedance: f64,
    ) -> Self {
        self.port_list
            .push((component.into(), pin.into(), impedance));
        self
    }

    /// Sets whether the box is fit around the geometry.
    pub fn box_plus_buffer(mut self, enabled: bool) -> Self {
        self.box_plus_buffer = enabled;
        self
    }
}

/// The files produced by a render and its non-fatal issues.
#[derive(Debug, Clone, Default)]
pub struct RenderOutput {
    /// File contents keyed by file name.
    pub files: IndexMap<String, String>,
    /// Warnings raised while rendering.
    pub issues: IssueSet<RenderIssue>,
}

impl RenderOutput {
    /// Writes every file into `dir`, creating directories as needed.
    ///
    /// Fails with [`std::io::ErrorKind::InvalidInput`] before writing
    /// anything if a file name is absolute or climbs out of `dir`.
    pub fn write_to(&self, dir: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        use std::path::Component;

        let dir = dir.as_ref();
        if let Some(name) = self.files.keys().find(|name| {
            std::path::Path::new(name.as_str())
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        }) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("output file `{name}` is outside the output directory"),
            ));
        }
        std::fs::create_dir_all(dir)?;
        for (name, contents) in &self.files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, contents)?;
            tracing::info!(file = %path.display(), "wrote render output");
        }
        Ok(())
    }
}

/// A non-fatal problem found while rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderIssue {
    cause: RenderCause,
    severity: Severity,
}

/// What went wrong during a render.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RenderCause {
    /// A port was placed on a pin that is connected to a net.
    PortOnConnectedPin { component: ArcStr, pin: ArcStr },
    /// A `jj_to_port` or `ignored_jjs` entry matched no junction.
    UnmatchedJunction { component: ArcStr, element: ArcStr },
    /// The layer stack names chips the design does not define.
    ChipNamesMismatch,
    /// The buffered component box extends past the chip.
    ComponentsOutsideChip { chip: ArcStr },
    /// A chip's size data is missing or not numeric.
    BadChipSize { chip: ArcStr },
}

impl Diagnostic for RenderIssue {
    fn help(&self) -> Option<Box<dyn Display>> {
        match &self.cause {
            RenderCause::ChipNamesMismatch => Some(Box::new(
                "the render box falls back to the component bounds",
            )),
            RenderCause::ComponentsOutsideChip { .. } => {
                Some(Box::new("enlarge the chip or move the components"))
            }
            _ => None,
        }
    }

    fn severity(&self) -> Severity {
        self.severity
    }
}

impl RenderIssue {
    /// Creates an issue.
    pub fn new(cause: RenderCause, severity: Severity) -> Self {
        Self { cause, severity }
    }

    pub(crate) fn warn(cause: RenderCause) -> Self {
        let result = Self::new(cause, Severity::Warning);
        tracing::event!(Level::WARN, issue = ?result.cause, "{}", result);
        result
    }

    /// The cause.
    pub fn cause(&self) -> &RenderCause {
        &self.cause
    }
}

impl Display for RenderIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            RenderCause::PortOnConnectedPin { component, pin } => {
                write!(f, "port on `{component}.{pin}`, which is connected to a net")
            }
            RenderCause::UnmatchedJunction { component, element } => {
                write!(f, "no junction `{element}` in component `{component}`")
            }
            RenderCause::ChipNamesMismatch => {
                write!(f, "layer stack chip names do not match the design")
            }
            RenderCause::ComponentsOutsideChip { chip } => {
                write!(f, "components extend past chip `{chip}`")
            }
            RenderCause::BadChipSize { chip } => write!(f, "chip `{chip}` has no usable size"),
        }
    }
}

/// A simulator backend.
pub trait Renderer {
    /// The renderer name, used as the prefix of its table columns.
    fn name(&self) -> &'static str;

    /// The renderer's default options.
    fn default_options(&self) -> Options;

    /// Column defaults this renderer adds to each geometry table.
    fn element_table_data(&self) -> IndexMap<ElementKind, Options> {
        IndexMap::new()
    }

    /// Readies the renderer for use.
    fn start(&mut self);

    /// Releases the renderer.
    fn stop(&mut self);

    /// Returns `true` between [`Renderer::start`] and [`Renderer::stop`].
    fn is_initiated(&self) -> bool;

    /// Renders a design.
    fn render_design(
        &self,
        design: &Design,
        request: &RenderRequest,
    ) -> Result<RenderOutput, RenderError>;
}

/// Renderer options merged over the renderer's defaults and parsed against
/// the design variables.
#[derive(Debug, Clone)]
pub(crate) struct RendererOptions {
    renderer: &'static str,
    values: ParsedOptions,
}

impl RendererOptions {
    pub(crate) fn new(
        renderer: &'static str,
        defaults: Options,
        overrides: &Options,
        variables: &Options,
    ) -> Result<Self, RenderError> {
        let mut raw = defaults;
        merge_options(&mut raw, overrides);
        let values = parse_options(&raw, variables).map_err(|e| RenderError::InvalidOption {
            renderer,
            option: String::new(),
            value: e.to_string(),
        })?;
        Ok(Self { renderer, values })
    }

    fn invalid(&self, path: &[&str], value: Option<&Value>) -> RenderError {
        RenderError::InvalidOption {
            renderer: self.renderer,
            option: path.join("."),
            value: value.map_or_else(|| "<missing>".to_string(), ToString::to_string),
        }
    }

    pub(crate) fn get(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut value = self.values.get(*first)?;
        for key in rest {
            value = value.as_map()?.get(*key)?;
        }
        Some(value)
    }

    /// A length in database units.
    pub(crate) fn length(&self, path: &[&str]) -> Result<i64, RenderError> {
        let value = self.get(path);
        value
            .and_then(Value::as_db)
            .ok_or_else(|| self.invalid(path, value))
    }

    pub(crate) fn number(&self, path: &[&str]) -> Result<f64, RenderError> {
        let value = self.get(path);
        value
            .and_then(Value::as_f64)
            .ok_or_else(|| self.invalid(path, value))
    }

    /// Text as written, or a number in its shortest form.
    pub(crate) fn text(&self, path: &[&str]) -> Result<String, RenderError> {
        match self.get(path) {
            Some(v @ (Value::Text(_) | Value::Number(_))) => Ok(v.to_string()),
            other => Err(self.invalid(path, other)),
        }
    }
}

/// A resolved render: the selected rows, the render box and early warnings.
#[derive(Debug)]
pub(crate) struct Prepared<'a> {
    pub(crate) case: SelectionCase,
    pub(crate) ids: Vec<ComponentId>,
    pub(crate) tables: TableBounds<'a>,
    pub(crate) open_pins: Vec<(&'a ArcStr, &'a Pin)>,
    pub(crate) ports: Vec<(&'a ArcStr, &'a Pin, f64)>,
    pub(crate) issues: IssueSet<RenderIssue>,
}

impl<'a> Prepared<'a> {
    /// Selected rows of one table, excluding helpers.
    pub(crate) fn rows(&self, kind: ElementKind) -> impl Iterator<Item = &'a QGeometryRow> + '_ {
        self.tables
            .path_poly_and_junction
            .iter()
            .filter(move |(k, row)| *k == kind && !row.helper)
            .map(|(_, row)| *row)
    }

    /// Chips that carry selected geometry or open pins, in design order.
    pub(crate) fn chips_in_use(&self, design: &Design) -> Vec<ArcStr> {
        let used: IndexSet<&ArcStr> = self
            .tables
            .path_poly_and_junction
            .iter()
            .map(|(_, row)| &row.chip)
            .chain(self.open_pins.iter().map(|(_, pin)| &pin.chip))
            .collect();
        design
            .chips()
            .keys()
            .filter(|chip| used.contains(chip))
            .cloned()
            .collect()
    }
}

/// Checks a request against a design and collects what every renderer needs.
pub(crate) fn prepare<'a>(
    design: &'a Design,
    request: &RenderRequest,
    x_buffer: i64,
    y_buffer: i64,
) -> Result<Prepared<'a>, RenderError> {
    let selection: Vec<&str> = request.selection.iter().map(ArcStr::as_str).collect();
    let (ids, case) = design.get_unique_component_ids(&selection);
    if case == SelectionCase::Missing {
        let missing = request
            .selection
            .iter()
            .filter(|name| design.find_id(name).is_none())
            .cloned()
            .collect();
        return Err(RenderError::InvalidSelection(missing));
    }

    let lookup_pin = |component: &ArcStr, pin: &ArcStr| {
        design
            .component(component)
            .and_then(|c| c.pin(pin).map(|p| (c.name(), p)))
            .ok_or_else(|| RenderError::InvalidPin {
                component: component.clone(),
                pin: pin.clone(),
            })
    };
    let open_pins = request
        .open_pins
        .iter()
        .map(|(c, p)| lookup_pin(c, p))
        .collect::<Result<Vec<_>, _>>()?;
    let ports = request
        .port_list
        .iter()
        .map(|(c, p, z)| lookup_pin(c, p).map(|(name, pin)| (name, pin, *z)))
        .collect::<Result<Vec<_>, _>>()?;

    let tables = design.get_bounds_of_path_and_poly_tables(
        request.box_plus_buffer,
        &ids,
        case,
        x_buffer,
        y_buffer,
    );
    if let Some((_, row)) = tables
        .path_poly_and_junction
        .iter()
        .find(|(_, row)| !design.chips().contains_key(&row.chip))
    {
        return Err(RenderError::UnknownChip {
            chip: row.chip.clone(),
            component: component_name(design, row.component),
            element: row.name.clone(),
        });
    }

    let mut issues = IssueSet::new();
    if !tables.chip_names_matched {
        issues.add(RenderIssue::warn(RenderCause::ChipNamesMismatch));
    }
    for (component, pin, _) in &ports {
        if pin.is_connected() {
            issues.add(RenderIssue::warn(RenderCause::PortOnConnectedPin {
                component: (*component).clone(),
                pin: pin.name.clone(),
            }));
        }
    }

    tracing::debug!(
        ?case,
        rows = tables.path_poly_and_junction.len(),
        bounds = ?tables.bounds,
        "prepared render"
    );
    Ok(Prepared {
        case,
        ids,
        tables,
        open_pins,
        ports,
        issues,
    })
}

/// The name of a component, or its ID if it has been deleted.
pub(crate) fn component_name(design: &Design, id: ComponentId) -> ArcStr {
    design
        .component_by_id(id)
        .map(|c| c.name().clone())
        .unwrap_or_else(|| arcstr::format!("{}", id))
}

/// The ground cutout at the end of an open pin.
///
/// The rectangle is centered `gap / 2` beyond the pin along its normal.
/// It is `gap` long along the normal and `width + 2 * gap` wide across it.
pub fn endcap(pin: &Pin) -> Rect {
    let gap = pin.gap;
    let center = pin.middle.offset(pin.normal * (gap as f64 / 2.));
    let across = pin.width + 2 * gap;
    if pin.normal.x.abs() > pin.normal.y.abs() {
        Rect::from_center(center, gap, across)
    } else {
        Rect::from_center(center, across, gap)
    }
}

/// Formats database units as millimeters in their shortest exact form.
pub(crate) fn mm(db: i64) -> Decimal {
    from_db_units(db).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ComponentId;

    fn pin(points: [Point; 2], width: i64, norm: bool, gap: i64) -> Pin {
        Pin::new(
            "p",
            points,
            width,
            norm,
            "main",
            Some(gap),
            ComponentId::from_raw(1),
        )
        .unwrap()
    }

    #[test]
    fn endcap_along_x() {
        let p = pin([Point::new(100, 5), Point::new(100, -5)], 10, false, 6);
        assert_eq!(endcap(&p), Rect::from_sides(100, -11, 106, 11));
    }

    #[test]
    fn endcap_along_y() {
        let p = pin([Point::new(0, 0), Point::new(0, 100)], 20, true, 4);
        assert_eq!(endcap(&p), Rect::from_sides(-14, 100, 14, 104));
    }

    #[test]
    fn mm_is_normalized() {
        assert_eq!(mm(200_000).to_string(), "0.2");
        assert_eq!(mm(-750_000).to_string(), "-0.75");
        assert_eq!(mm(0).to_string(), "0");
    }
}
