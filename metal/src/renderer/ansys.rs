//! Ansys HFSS and Q3D export.
//!
//! The renderer produces an ordered list of modeler commands as JSON. A thin
//! driver on the Ansys side replays them: draw the metal, cut the ground
//! planes, assign boundaries and mesh operations, then add ports (HFSS) or
//! thin conductors and nets (Q3D).
//!
//! All coordinates are in millimeters.

use std::collections::HashSet;

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::Serialize;

use super::{
    endcap, prepare, RenderCause, RenderError, RenderIssue, RenderOutput, RenderRequest, Renderer,
    RendererOptions,
};
use crate::component::pin::Pin;
use crate::design::{Design, SelectionCase};
use crate::naming::clean_name;
use crate::parse::{db_to_mm_f64, options, to_db_units, Options, RawValue};
use crate::qgeometry::{ElementKind, QGeometryRow};

/// A point in millimeters.
pub type Point3 = [f64; 3];

/// The Ansys solution type a renderer targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Solution {
    /// Driven modal and eigenmode analysis.
    Hfss,
    /// Quasi-static capacitance extraction.
    Q3d,
}

impl Solution {
    /// The renderer name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hfss => "hfss",
            Self::Q3d => "q3d",
        }
    }
}

/// The in-plane direction of a port or lumped element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Along x.
    X,
    /// Along y.
    Y,
}

/// One modeler operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// A rectangle sheet centered on a point.
    DrawRectCenter {
        name: String,
        center: Point3,
        x_size: f64,
        y_size: f64,
    },
    /// A rectangle sheet from its lower left corner.
    DrawRectCorner {
        name: String,
        corner: Point3,
        x_size: f64,
        y_size: f64,
    },
    /// A polyline, closed into a sheet when `closed` is set.
    DrawPolyline {
        name: String,
        points: Vec<Point3>,
        closed: bool,
    },
    /// Sweeps `profile` along `path`, replacing `path` with the swept sheet.
    SweepAlongPath { profile: String, path: String },
    /// A box centered on a point.
    DrawBox {
        name: String,
        center: Point3,
        size: Point3,
        material: ArcStr,
    },
    /// Subtracts `tools` from `blank`.
    Subtract { blank: String, tools: Vec<String> },
    /// Perfect electric conductor boundary.
    AssignPerfectE { objects: Vec<String> },
    /// Lumped RLC boundary on a sheet.
    AssignLumpedRlc {
        name: String,
        object: String,
        axis: Axis,
        inductance: String,
        capacitance: String,
        resistance: String,
    },
    /// Lumped port on a sheet.
    AssignLumpedPort {
        name: String,
        object: String,
        axis: Axis,
        impedance: String,
    },
    /// Maximum element length on the given objects.
    AssignMeshLength {
        name: String,
        objects: Vec<String>,
        max_length: f64,
    },
    /// Thin conductor boundary.
    AssignThinConductor {
        name: String,
        objects: Vec<String>,
        material: ArcStr,
        thickness: String,
    },
    /// Lets Q3D find nets from touching conductors.
    AutoIdentifyNets,
}

/// The rendered command list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnsysScript {
    /// The design name.
    pub design: ArcStr,
    /// The solution type.
    pub solution: Solution,
    /// Rendered components, in selection order.
    pub components: Vec<ArcStr>,
    /// Commands in execution order.
    pub commands: Vec<Command>,
}

/// The default options.
pub fn default_options() -> Options {
    options([
        ("Lj", RawValue::from("10nH")),
        ("Cj", RawValue::Int(0)),
        ("_Rj", RawValue::Int(0)),
        ("max_mesh_length_jj", "7um".into()),
        ("max_mesh_length_port", "7um".into()),
        ("x_buffer_width_mm", RawValue::Float(0.2)),
        ("y_buffer_width_mm", RawValue::Float(0.2)),
        ("port_inductor_gap", "10um".into()),
        ("thin_conductor_material", "pec".into()),
        ("thin_conductor_thickness", "200 nm".into()),
    ])
}

/// The columns this renderer adds to the geometry tables.
pub fn element_table_data() -> IndexMap<ElementKind, Options> {
    IndexMap::from([
        (
            ElementKind::Path,
            options([("wire_bonds", RawValue::Bool(false))]),
        ),
        (
            ElementKind::Junction,
            options([
                ("inductance", RawValue::from("10nH")),
                ("capacitance", RawValue::Int(0)),
                ("resistance", RawValue::Int(0)),
                ("mesh_kw_jj", "7um".into()),
            ]),
        ),
    ])
}

/// Renders designs into Ansys modeler commands.
#[derive(Debug, Clone)]
pub struct AnsysRenderer {
    solution: Solution,
    overrides: Options,
    initiated: bool,
}

impl AnsysRenderer {
    /// Creates an HFSS renderer.
    pub fn hfss(overrides: Options) -> Self {
        Self::new(Solution::Hfss, overrides)
    }

    /// Creates a Q3D renderer.
    pub fn q3d(overrides: Options) -> Self {
        Self::new(Solution::Q3d, overrides)
    }

    fn new(solution: Solution, overrides: Options) -> Self {
        Self {
            solution,
            overrides,
            initiated: false,
        }
    }

    /// The solution type.
    pub fn solution(&self) -> Solution {
        self.solution
    }

    /// Overrides one option.
    pub fn set_option(&mut self, key: impl Into<ArcStr>, value: impl Into<RawValue>) {
        self.overrides.insert(key.into(), value.into());
    }

    /// Builds the command list without wrapping it as an output file.
    pub fn build_script(
        &self,
        design: &Design,
        request: &RenderRequest,
    ) -> Result<(AnsysScript, Vec<RenderIssue>), RenderError> {
        let name = self.solution.name();
        if !self.initiated {
            return Err(RenderError::NotInitiated(name));
        }
        let opts = RendererOptions::new(name, default_options(), &self.overrides, design.variables())?;
        let x_buffer = opts.length(&["x_buffer_width_mm"])?;
        let y_buffer = opts.length(&["y_buffer_width_mm"])?;
        let prepared = prepare(design, request, x_buffer, y_buffer)?;
        let mut issues: Vec<RenderIssue> = prepared.issues.iter().cloned().collect();

        let mut b = Builder {
            design,
            renderer: name,
            commands: Vec::new(),
            metal: Vec::new(),
            cuts: IndexMap::new(),
            jj_mesh: Vec::new(),
            port_mesh: Vec::new(),
        };

        let ignored: HashSet<(&str, &str)> = request
            .ignored_jjs
            .iter()
            .map(|(c, e)| (c.as_str(), e.as_str()))
            .collect();
        let mut matched: HashSet<(ArcStr, ArcStr)> = HashSet::new();
        let gap = opts.length(&["port_inductor_gap"])?;
        let defaults = JunctionValues {
            inductance: opts.text(&["Lj"])?,
            capacitance: opts.text(&["Cj"])?,
            resistance: opts.text(&["_Rj"])?,
        };

        for kind in ElementKind::ALL {
            let skip = kind == ElementKind::Junction
                && (request.skip_junctions || self.solution == Solution::Q3d);
            if skip {
                continue;
            }
            for row in prepared.rows(kind) {
                match kind {
                    ElementKind::Poly => b.poly(row),
                    ElementKind::Path => b.path(row),
                    ElementKind::Junction => {
                        let component = super::component_name(design, row.component);
                        let key = (component.clone(), row.name.clone());
                        if ignored.contains(&(component.as_str(), row.name.as_str())) {
                            tracing::debug!(component = %component, element = %row.name, "ignoring junction");
                            matched.insert(key);
                            continue;
                        }
                        let port = request
                            .jj_to_port
                            .iter()
                            .find(|(c, e, _, _)| *c == component && *e == row.name);
                        let values = defaults.for_row(name, row);
                        match port {
                            Some((_, _, impedance, draw_ind)) => {
                                b.junction_port(row, &component, *impedance, *draw_ind, gap, &values)?;
                                matched.insert(key);
                            }
                            None => b.junction(row, &component, &values),
                        }
                    }
                }
            }
        }

        let unmatched = request
            .jj_to_port
            .iter()
            .map(|(c, e, ..)| (c, e))
            .chain(request.ignored_jjs.iter().map(|(c, e)| (c, e)));
        for (component, element) in unmatched {
            if !matched.contains(&(component.clone(), element.clone())) {
                issues.push(RenderIssue::warn(RenderCause::UnmatchedJunction {
                    component: component.clone(),
                    element: element.clone(),
                }));
            }
        }

        let endcap_pins = prepared.open_pins.iter().copied().chain(
            prepared
                .ports
                .iter()
                .filter(|_| self.solution == Solution::Hfss)
                .map(|(c, p, _)| (*c, *p)),
        );
        for (component, pin) in endcap_pins {
            let name = format!("endcap_{}_{}", component, pin.name);
            let z = chip_z(design, &pin.chip);
            b.rect(&name, endcap(pin), z);
            b.cuts.entry(pin.chip.clone()).or_default().push(name);
        }

        let grounds = b.chips(&prepared, request, x_buffer, y_buffer, self.solution, &mut issues);

        for (chip, ground) in &grounds {
            if let Some(tools) = b.cuts.get(chip).filter(|t| !t.is_empty()) {
                b.commands.push(Command::Subtract {
                    blank: ground.clone(),
                    tools: tools.clone(),
                });
                b.metal.push(ground.clone());
            }
        }

        if !b.jj_mesh.is_empty() {
            let objects = std::mem::take(&mut b.jj_mesh);
            b.commands.push(Command::AssignMeshLength {
                name: "small_mesh".to_string(),
                objects,
                max_length: db_to_mm_f64(opts.length(&["max_mesh_length_jj"])?),
            });
        }

        match self.solution {
            Solution::Hfss => {
                if !b.metal.is_empty() {
                    b.commands.push(Command::AssignPerfectE {
                        objects: b.metal.clone(),
                    });
                }
                for (component, pin, impedance) in &prepared.ports {
                    b.pin_port(component, pin, *impedance);
                }
                if !b.port_mesh.is_empty() {
                    let objects = std::mem::take(&mut b.port_mesh);
                    b.commands.push(Command::AssignMeshLength {
                        name: "port_mesh".to_string(),
                        objects,
                        max_length: db_to_mm_f64(opts.length(&["max_mesh_length_port"])?),
                    });
                }
            }
            Solution::Q3d => {
                if !b.metal.is_empty() {
                    b.commands.push(Command::AssignThinConductor {
                        name: "ThinCond1".to_string(),
                        objects: b.metal.clone(),
                        material: opts.text(&["thin_conductor_material"])?.into(),
                        thickness: format!("{}nm", opts.length(&["thin_conductor_thickness"])?),
                    });
                }
                b.commands.push(Command::AutoIdentifyNets);
            }
        }

        let components = match prepared.case {
            SelectionCase::Subset => prepared
                .ids
                .iter()
                .filter_map(|id| design.component_by_id(*id))
                .map(|c| c.name().clone())
                .collect(),
            _ => design.components().map(|c| c.name().clone()).collect(),
        };
        tracing::info!(
            design = %design.name(),
            solution = name,
            case = ?prepared.case,
            commands = b.commands.len(),
            "rendered ansys script"
        );
        Ok((
            AnsysScript {
                design: design.name().clone(),
                solution: self.solution,
                components,
                commands: b.commands,
            },
            issues,
        ))
    }
}

impl Renderer for AnsysRenderer {
    fn name(&self) -> &'static str {
        self.solution.name()
    }

    fn default_options(&self) -> Options {
        default_options()
    }

    fn element_table_data(&self) -> IndexMap<ElementKind, Options> {
        element_table_data()
    }

    fn start(&mut self) {
        tracing::debug!(renderer = self.name(), "starting");
        self.initiated = true;
    }

    fn stop(&mut self) {
        tracing::debug!(renderer = self.name(), "stopping");
        self.initiated = false;
    }

    fn is_initiated(&self) -> bool {
        self.initiated
    }

    fn render_design(
        &self,
        design: &Design,
        request: &RenderRequest,
    ) -> Result<RenderOutput, RenderError> {
        let (script, issues) = self.build_script(design, request)?;
        let text = serde_json::to_string_pretty(&script).map_err(|e| RenderError::InvalidOption {
            renderer: self.name(),
            option: "script".to_string(),
            value: e.to_string(),
        })?;
        let mut output = RenderOutput::default();
        output
            .files
            .insert(format!("{}_{}.json", design.name(), self.name()), text);
        output.issues.extend(issues);
        Ok(output)
    }
}

struct JunctionValues {
    inductance: String,
    capacitance: String,
    resistance: String,
}

impl JunctionValues {
    /// Row columns take precedence over the renderer options.
    fn for_row(&self, renderer: &str, row: &QGeometryRow) -> Self {
        let column = |key: &str, fallback: &String| {
            row.column(&format!("{renderer}_{key}"))
                .map_or_else(|| fallback.clone(), ToString::to_string)
        };
        Self {
            inductance: column("inductance", &self.inductance),
            capacitance: column("capacitance", &self.capacitance),
            resistance: column("resistance", &self.resistance),
        }
    }
}

struct Builder<'a> {
    design: &'a Design,
    renderer: &'static str,
    commands: Vec<Command>,
    /// Sheets that become conductors.
    metal: Vec<String>,
    /// chip -> sheets cut from its ground plane
    cuts: IndexMap<ArcStr, Vec<String>>,
    jj_mesh: Vec<String>,
    port_mesh: Vec<String>,
}

impl Builder<'_> {
    fn rect(&mut self, name: &str, rect: Rect, z: i64) {
        let center = rect.center();
        self.commands.push(Command::DrawRectCenter {
            name: name.to_string(),
            center: point3(center, z),
            x_size: db_to_mm_f64(rect.width()),
            y_size: db_to_mm_f64(rect.height()),
        });
    }

    fn corner_rect(&mut self, name: &str, rect: Rect, z: i64) {
        self.commands.push(Command::DrawRectCorner {
            name: name.to_string(),
            corner: point3(Point::new(rect.left(), rect.bot()), z),
            x_size: db_to_mm_f64(rect.width()),
            y_size: db_to_mm_f64(rect.height()),
        });
    }

    fn polyline(&mut self, name: &str, points: &[Point], z: i64, closed: bool) {
        self.commands.push(Command::DrawPolyline {
            name: name.to_string(),
            points: points.iter().map(|p| point3(*p, z)).collect(),
            closed,
        });
    }

    fn element_name(&self, row: &QGeometryRow) -> String {
        let component = super::component_name(self.design, row.component);
        format!("{}_{}", clean_name(&row.name), clean_name(&component))
    }

    fn sort(&mut self, row: &QGeometryRow, name: String, metal: bool) {
        if row.subtract {
            self.cuts.entry(row.chip.clone()).or_default().push(name);
        } else if metal {
            self.metal.push(name);
        }
    }

    fn poly(&mut self, row: &QGeometryRow) {
        let name = self.element_name(row);
        let z = chip_z(self.design, &row.chip);
        match (&row.geometry, row.geometry.as_rect()) {
            (_, Some(rect)) => self.rect(&name, rect, z),
            (Shape::Polygon(poly), None) => {
                self.polyline(&name, poly.points(), z, true);
                let holes: Vec<String> = poly
                    .interiors()
                    .iter()
                    .enumerate()
                    .map(|(i, hole)| {
                        let hole_name = format!("{name}_hole{i}");
                        self.polyline(&hole_name, hole, z, true);
                        hole_name
                    })
                    .collect();
                if !holes.is_empty() {
                    self.commands.push(Command::Subtract {
                        blank: name.clone(),
                        tools: holes,
                    });
                }
            }
            _ => return,
        }
        self.sort(row, name, true);
    }

    fn path(&mut self, row: &QGeometryRow) {
        let Shape::Path(path) = &row.geometry else {
            return;
        };
        let name = self.element_name(row);
        let z = chip_z(self.design, &row.chip);
        self.polyline(&name, path.points(), z, false);
        let width = path.width();
        if width > 0 {
            if let Some([p0, p1]) = sweep_profile(path) {
                let profile = format!("{name}_profile");
                self.polyline(&profile, &[p0, p1], z, false);
                self.commands.push(Command::SweepAlongPath {
                    profile,
                    path: name.clone(),
                });
            }
        }
        self.sort(row, name, width > 0);
    }

    fn junction(&mut self, row: &QGeometryRow, component: &ArcStr, values: &JunctionValues) {
        let Some((rect, axis)) = junction_rect(row) else {
            return;
        };
        let z = chip_z(self.design, &row.chip);
        let inductor = format!("Lj_{}_{}", component, row.name);
        self.inductor(&inductor, rect, axis, z, values);
    }

    fn inductor(&mut self, name: &str, rect: Rect, axis: Axis, z: i64, values: &JunctionValues) {
        let sheet = format!("JJ_rect_{name}");
        self.corner_rect(&sheet, rect, z);
        self.commands.push(Command::AssignLumpedRlc {
            name: format!("Lj_{name}"),
            object: sheet.clone(),
            axis,
            inductance: values.inductance.clone(),
            capacitance: values.capacitance.clone(),
            resistance: values.resistance.clone(),
        });
        self.jj_mesh.push(sheet);
        self.polyline(&format!("JJ_{name}_"), &axis_line(rect, axis), z, false);
    }

    fn junction_port(
        &mut self,
        row: &QGeometryRow,
        component: &ArcStr,
        impedance: f64,
        draw_inductor: bool,
        gap: i64,
        values: &JunctionValues,
    ) -> Result<(), RenderError> {
        let Some((rect, axis)) = junction_rect(row) else {
            return Ok(());
        };
        let z = chip_z(self.design, &row.chip);
        let (port_rect, inductor_rect) = if draw_inductor {
            let split = match axis {
                Axis::X => {
                    let mid = (rect.bot() + rect.top()) / 2;
                    Rect::from_sides_option(rect.left(), mid + gap / 2, rect.right(), rect.top())
                        .zip(Rect::from_sides_option(
                            rect.left(),
                            rect.bot(),
                            rect.right(),
                            mid - gap / 2,
                        ))
                }
                Axis::Y => {
                    let mid = (rect.left() + rect.right()) / 2;
                    Rect::from_sides_option(mid + gap / 2, rect.bot(), rect.right(), rect.top())
                        .zip(Rect::from_sides_option(
                            rect.left(),
                            rect.bot(),
                            mid - gap / 2,
                            rect.top(),
                        ))
                }
            };
            let (port, inductor) = split.ok_or_else(|| RenderError::InvalidOption {
                renderer: self.renderer,
                option: "port_inductor_gap".to_string(),
                value: format!("{} mm", db_to_mm_f64(gap)),
            })?;
            (port, Some(inductor))
        } else {
            (rect, None)
        };

        let port = format!("Port_{}_{}", component, row.name);
        self.corner_rect(&port, port_rect, z);
        self.commands.push(Command::AssignLumpedPort {
            name: format!("LumpPort_{}_{}", component, row.name),
            object: port.clone(),
            axis,
            impedance: format!("{impedance}ohm"),
        });
        self.polyline(
            &format!("voltage_line_{port}"),
            &axis_line(port_rect, axis),
            z,
            false,
        );

        if let Some(rect) = inductor_rect {
            let inductor = format!("Lj_{}_{}", component, row.name);
            self.inductor(&inductor, rect, axis, z, values);
        }
        Ok(())
    }

    /// A lumped port bridging the gap at the end of a pin.
    fn pin_port(&mut self, component: &ArcStr, pin: &Pin, impedance: f64) {
        let z = chip_z(self.design, &pin.chip);
        let start = pin.middle;
        let end = pin.middle.offset(pin.normal * pin.gap as f64);
        let half = pin.width / 2;
        let (rect, axis) = if pin.normal.x.abs() > pin.normal.y.abs() {
            (
                Rect::from_sides(
                    start.x.min(end.x),
                    start.y - half,
                    start.x.max(end.x),
                    start.y + pin.width - half,
                ),
                Axis::X,
            )
        } else {
            (
                Rect::from_sides(
                    start.x - half,
                    start.y.min(end.y),
                    start.x + pin.width - half,
                    start.y.max(end.y),
                ),
                Axis::Y,
            )
        };
        let port = format!("Port_{}_{}", component, pin.name);
        self.corner_rect(&port, rect, z);
        self.commands.push(Command::AssignLumpedPort {
            name: format!("LumpPort_{}_{}", component, pin.name),
            object: port.clone(),
            axis,
            impedance: format!("{impedance}ohm"),
        });
        self.polyline(&format!("voltage_line_{port}"), &[start, end], z, false);
        self.port_mesh.push(port);
    }

    /// Draws the ground plane and substrate of every chip in use and
    /// returns the ground sheet names.
    ///
    /// Only `main` is fit around the geometry. Other chips keep their size.
    fn chips(
        &mut self,
        prepared: &super::Prepared<'_>,
        request: &RenderRequest,
        x_buffer: i64,
        y_buffer: i64,
        solution: Solution,
        issues: &mut Vec<RenderIssue>,
    ) -> IndexMap<ArcStr, String> {
        let mut grounds = IndexMap::new();
        for chip in prepared.chips_in_use(self.design) {
            let Ok(dims) = self.design.chip_dims(&chip) else {
                issues.push(RenderIssue::warn(RenderCause::BadChipSize { chip }));
                continue;
            };
            let is_main = chip == "main";
            let footprint = match prepared.tables.bounds {
                Some(b) if is_main && request.box_plus_buffer => b,
                _ if !is_main => dims.rect(),
                _ => {
                    let geometry = prepared
                        .tables
                        .path_and_poly
                        .iter()
                        .filter(|(_, row)| row.chip == chip)
                        .map(|(_, row)| &row.geometry)
                        .collect::<Vec<_>>()
                        .bbox()
                        .map(|r| r.expand_xy(x_buffer, y_buffer));
                    if let Some(g) = geometry {
                        if !dims.rect().encloses(&g) {
                            issues.push(RenderIssue::warn(RenderCause::ComponentsOutsideChip {
                                chip: chip.clone(),
                            }));
                        }
                    }
                    dims.rect()
                }
            };

            let ground = format!("ground_{chip}_plane");
            self.rect(&ground, footprint, dims.center_z);
            let material = self
                .design
                .chips()
                .get(&chip)
                .map(|c| c.material.clone())
                .unwrap_or_else(|| arcstr::literal!("silicon"));
            let center = footprint.center();
            self.commands.push(Command::DrawBox {
                name: chip.to_string(),
                center: point3(center, dims.center_z + dims.size_z / 2),
                size: [
                    db_to_mm_f64(footprint.width()),
                    db_to_mm_f64(footprint.height()),
                    db_to_mm_f64(dims.size_z.abs()),
                ],
                material,
            });

            if solution == Solution::Hfss && grounds.is_empty() {
                self.sample_holder(&chip, footprint);
            }
            grounds.insert(chip, ground);
        }
        grounds
    }

    /// The vacuum box around the first chip, if its size names a sample holder.
    fn sample_holder(&mut self, chip: &str, footprint: Rect) {
        let value = |key: &str| -> Option<i64> {
            self.design.chip_size_value(chip, key).map(to_db_units)
        };
        let (Some(top), Some(bottom)) = (value("sample_holder_top"), value("sample_holder_bottom"))
        else {
            tracing::debug!(chip, "no sample holder size; skipping vacuum box");
            return;
        };
        self.commands.push(Command::DrawBox {
            name: "sample_holder".to_string(),
            center: point3(footprint.center(), (top - bottom) / 2),
            size: [
                db_to_mm_f64(footprint.width()),
                db_to_mm_f64(footprint.height()),
                db_to_mm_f64(top + bottom),
            ],
            material: arcstr::literal!("vacuum"),
        });
    }
}

fn point3(p: Point, z: i64) -> Point3 {
    [db_to_mm_f64(p.x), db_to_mm_f64(p.y), db_to_mm_f64(z)]
}

fn chip_z(design: &Design, chip: &str) -> i64 {
    design.get_chip_z(chip).map(to_db_units).unwrap_or_default()
}

/// The sheet covered by a junction and the direction current flows across it.
///
/// A junction runs between the ends of its path and is as wide as the path.
pub fn junction_rect(row: &QGeometryRow) -> Option<(Rect, Axis)> {
    let path = row.geometry.path()?;
    let (p0, p1) = path.endpoints()?;
    let w = path.width();
    let half = w / 2;
    if (p1.y - p0.y).abs() > (p1.x - p0.x).abs() {
        let rect = Rect::from_sides(p0.x - half, p0.y.min(p1.y), p0.x + w - half, p0.y.max(p1.y));
        Some((rect, Axis::Y))
    } else {
        let rect = Rect::from_sides(p0.x.min(p1.x), p0.y - half, p0.x.max(p1.x), p0.y + w - half);
        Some((rect, Axis::X))
    }
}

/// The line through the middle of `rect` along `axis`.
fn axis_line(rect: Rect, axis: Axis) -> [Point; 2] {
    let c = rect.center();
    match axis {
        Axis::X => [Point::new(rect.left(), c.y), Point::new(rect.right(), c.y)],
        Axis::Y => [Point::new(c.x, rect.bot()), Point::new(c.x, rect.top())],
    }
}

/// A segment across the start of `path`, one width long, to sweep along it.
fn sweep_profile(path: &Path) -> Option<[Point; 2]> {
    let pts = path.points();
    let (p0, p1) = (*pts.first()?, *pts.get(1)?);
    let dx = (p1.x - p0.x) as f64;
    let dy = (p1.y - p0.y) as f64;
    let len = dx.hypot(dy);
    if len == 0. {
        return None;
    }
    let k = path.width() as f64 / (2. * len);
    let ox = (k * -dy).round() as i64;
    let oy = (k * dx).round() as i64;
    Some([
        Point::new(p0.x + ox, p0.y + oy),
        Point::new(p0.x - ox, p0.y - oy),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ComponentId;

    fn junction_row(points: Vec<Point>, width: i64) -> QGeometryRow {
        QGeometryRow {
            component: ComponentId::from_raw(1),
            name: "rect_jj".into(),
            geometry: Shape::Path(Path::new(points, width)),
            layer: 1,
            chip: "main".into(),
            subtract: false,
            helper: false,
            fillet: None,
            extra: Options::new(),
        }
    }

    #[test]
    fn vertical_junction_spans_its_width_in_x() {
        let row = junction_row(vec![Point::new(0, 30), Point::new(0, -30)], 10);
        let (rect, axis) = junction_rect(&row).unwrap();
        assert_eq!(axis, Axis::Y);
        assert_eq!(rect, Rect::from_sides(-5, -30, 5, 30));
    }

    #[test]
    fn horizontal_junction_spans_its_width_in_y() {
        let row = junction_row(vec![Point::new(-20, 0), Point::new(20, 0)], 4);
        let (rect, axis) = junction_rect(&row).unwrap();
        assert_eq!(axis, Axis::X);
        assert_eq!(rect, Rect::from_sides(-20, -2, 20, 2));
    }

    #[test]
    fn sweep_profile_is_perpendicular_and_one_width_long() {
        let path = Path::new(vec![Point::new(0, 0), Point::new(100, 0)], 10);
        assert_eq!(
            sweep_profile(&path),
            Some([Point::new(0, 5), Point::new(0, -5)])
        );
    }

    #[test]
    fn junction_columns_override_options() {
        let mut row = junction_row(vec![Point::new(0, 0), Point::new(10, 0)], 2);
        row.extra.insert("hfss_inductance".into(), "12nH".into());
        let defaults = JunctionValues {
            inductance: "10nH".to_string(),
            capacitance: "0".to_string(),
            resistance: "0".to_string(),
        };
        let values = defaults.for_row("hfss", &row);
        assert_eq!(values.inductance, "12nH");
        assert_eq!(values.capacitance, "0");
    }

    #[test]
    fn commands_are_tagged_by_op() {
        let json = serde_json::to_value(Command::AutoIdentifyNets).unwrap();
        assert_eq!(json, serde_json::json!({ "op": "auto_identify_nets" }));
    }
}
