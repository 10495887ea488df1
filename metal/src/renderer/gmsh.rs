//! Gmsh `.geo` export using the OpenCASCADE kernel.
//!
//! Metal is drawn as zero-thickness surfaces at the chip's `center_z`. Each
//! chip gets a ground plane with the subtract geometry cut out of it and a
//! substrate volume. A vacuum box encloses every chip. Physical groups name
//! the pieces so that downstream solvers can address them.

use std::fmt::Display;

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;

use super::{
    endcap, mm, prepare, RenderCause, RenderError, RenderIssue, RenderOutput, RenderRequest,
    Renderer, RendererOptions,
};
use crate::design::Design;
use crate::naming::clean_name;
use crate::parse::{options, parse_raw, to_db_units, Options, RawValue};
use crate::qgeometry::{ElementKind, QGeometryRow};

/// The renderer name.
pub const NAME: &str = "gmsh";

/// Extra room around the chips inside the vacuum box, in database units.
const VACUUM_TOLERANCE: i64 = 1_000;

/// The default options.
pub fn default_options() -> Options {
    let color = |c: [i64; 4]| RawValue::List(c.into_iter().map(RawValue::Int).collect());
    options([
        ("x_buffer_width_mm", RawValue::Float(0.2)),
        ("y_buffer_width_mm", RawValue::Float(0.2)),
        (
            "mesh",
            RawValue::Table(options([
                ("max_size", RawValue::from("100um")),
                ("min_size", "3um".into()),
                ("smoothing", RawValue::Int(10)),
                ("nodes_per_2pi_curve", RawValue::Int(90)),
                ("algorithm_3d", RawValue::Int(10)),
                (
                    "mesh_size_fields",
                    RawValue::Table(options([
                        ("min_distance_from_edges", "10um"),
                        ("max_distance_from_edges", "130um"),
                        ("distance_delta", "30um"),
                        ("gradient_delta", "3um"),
                    ])),
                ),
                ("num_threads", RawValue::Int(8)),
                ("export_dir", ".".into()),
            ])),
        ),
        (
            "colors",
            RawValue::Table(options([
                ("metal", color([84, 140, 168, 255])),
                ("jj", color([84, 140, 168, 150])),
                ("sub", color([180, 180, 180, 255])),
            ])),
        ),
    ])
}

/// A named set of entities in the Gmsh model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhysicalGroup {
    /// The group name.
    pub name: ArcStr,
    /// 2 for surfaces, 3 for volumes.
    pub dim: u8,
    /// The physical tag.
    pub tag: u64,
}

/// The kind of metal a surface came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metal {
    Trace,
    Junction,
}

/// A rendered Gmsh model.
#[derive(Debug, Clone, Default)]
pub struct GmshModel {
    /// The `.geo` script.
    pub script: String,
    /// Physical groups in creation order.
    pub groups: Vec<PhysicalGroup>,
    /// Non-fatal issues.
    pub issues: diagnostics::IssueSet<RenderIssue>,
}

impl GmshModel {
    /// Looks up a physical group by name.
    pub fn group(&self, name: &str) -> Option<&PhysicalGroup> {
        self.groups.iter().find(|g| g.name == name)
    }
}

/// Writes a `.geo` script, allocating entity tags as it goes.
#[derive(Debug, Default)]
struct GeoScript {
    text: String,
    points: u64,
    curves: u64,
    loops: u64,
    surfaces: u64,
    volumes: u64,
    fields: u64,
    groups: Vec<PhysicalGroup>,
}

fn join<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    items.into_iter().join(", ")
}

/// A list variable reference, such as `s3()`.
fn vars(names: &[String]) -> String {
    join(names.iter().map(|n| format!("{n}()")))
}

impl GeoScript {
    fn emit(&mut self, line: impl AsRef<str>) {
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    fn comment(&mut self, text: impl Display) {
        self.emit(format!("// {text}"));
    }

    fn ring(&mut self, pts: &[Point], z: i64) -> u64 {
        let first = self.points + 1;
        for p in pts {
            self.points += 1;
            let line = format!(
                "Point({}) = {{{}, {}, {}}};",
                self.points,
                mm(p.x),
                mm(p.y),
                mm(z)
            );
            self.emit(line);
        }
        let n = pts.len() as u64;
        let mut lines = Vec::with_capacity(pts.len());
        for i in 0..n {
            self.curves += 1;
            let line = format!(
                "Line({}) = {{{}, {}}};",
                self.curves,
                first + i,
                first + (i + 1) % n
            );
            self.emit(line);
            lines.push(self.curves);
        }
        self.loops += 1;
        let line = format!("Curve Loop({}) = {{{}}};", self.loops, join(lines));
        self.emit(line);
        self.loops
    }

    fn polygon(&mut self, poly: &Polygon, z: i64) -> u64 {
        let mut loops = vec![self.ring(poly.points(), z)];
        for hole in poly.interiors() {
            loops.push(self.ring(hole, z));
        }
        self.surfaces += 1;
        let line = format!("Plane Surface({}) = {{{}}};", self.surfaces, join(loops));
        self.emit(line);
        self.surfaces
    }

    fn rectangle(&mut self, rect: Rect, z: i64) -> u64 {
        self.surfaces += 1;
        let line = format!(
            "Rectangle({}) = {{{}, {}, {}, {}, {}}};",
            self.surfaces,
            mm(rect.left()),
            mm(rect.bot()),
            mm(z),
            mm(rect.width()),
            mm(rect.height())
        );
        self.emit(line);
        self.surfaces
    }

    fn cuboid(&mut self, rect: Rect, z: i64, dz: i64) -> u64 {
        self.volumes += 1;
        let line = format!(
            "Box({}) = {{{}, {}, {}, {}, {}, {}}};",
            self.volumes,
            mm(rect.left()),
            mm(rect.bot()),
            mm(z.min(z + dz)),
            mm(rect.width()),
            mm(rect.height()),
            mm(dz.abs())
        );
        self.emit(line);
        self.volumes
    }

    /// Draws a shape, returning its surfaces. Paths become one surface per segment.
    fn shape(&mut self, shape: &Shape, z: i64) -> Vec<u64> {
        match shape {
            Shape::Rect(r) => vec![self.rectangle(*r, z)],
            Shape::Polygon(p) => vec![self.polygon(p, z)],
            Shape::Path(p) => p
                .segment_polygons()
                .iter()
                .map(|poly| self.polygon(poly, z))
                .collect(),
        }
    }

    /// Binds `var()` to the union of `surfaces`.
    fn bind_union(&mut self, var: &str, surfaces: &[u64]) {
        let line = match surfaces {
            [] => format!("{var}() = {{}};"),
            [one] => format!("{var}() = {{{one}}};"),
            [first, rest @ ..] => format!(
                "{var}() = BooleanUnion{{ Surface{{{first}}}; Delete; }}{{ Surface{{{}}}; Delete; }};",
                join(rest)
            ),
        };
        self.emit(line);
    }

    fn physical(&mut self, name: impl Into<ArcStr>, dim: u8, members: &str) -> u64 {
        let name = name.into();
        let tag = self.groups.len() as u64 + 1;
        let kind = if dim == 3 { "Volume" } else { "Surface" };
        let line = format!("Physical {kind}(\"{name}\", {tag}) = {{{members}}};");
        self.emit(line);
        self.groups.push(PhysicalGroup { name, dim, tag });
        tag
    }

    fn field(&mut self, kind: &str) -> u64 {
        self.fields += 1;
        let line = format!("Field[{}] = {kind};", self.fields);
        self.emit(line);
        self.fields
    }

    fn set_field(&mut self, field: u64, key: &str, value: impl Display) {
        self.emit(format!("Field[{field}].{key} = {value};"));
    }
}

/// Renders designs to Gmsh `.geo` scripts.
#[derive(Debug, Clone)]
pub struct GmshRenderer {
    overrides: Options,
    initiated: bool,
}

impl Default for GmshRenderer {
    fn default() -> Self {
        Self::new(Options::new())
    }
}

impl GmshRenderer {
    /// Creates a renderer with option overrides. The renderer is not started.
    pub fn new(overrides: Options) -> Self {
        Self {
            overrides,
            initiated: false,
        }
    }

    /// The option overrides.
    pub fn overrides(&self) -> &Options {
        &self.overrides
    }

    /// Overrides one option.
    pub fn set_option(&mut self, key: impl Into<ArcStr>, value: impl Into<RawValue>) {
        self.overrides.insert(key.into(), value.into());
    }

    /// Builds the Gmsh model without wrapping it as output files.
    pub fn build_model(
        &self,
        design: &Design,
        request: &RenderRequest,
    ) -> Result<GmshModel, RenderError> {
        if !self.initiated {
            return Err(RenderError::NotInitiated(NAME));
        }
        let opts = RendererOptions::new(NAME, default_options(), &self.overrides, design.variables())?;
        let x_buffer = opts.length(&["x_buffer_width_mm"])?;
        let y_buffer = opts.length(&["y_buffer_width_mm"])?;
        let prepared = prepare(design, request, x_buffer, y_buffer)?;
        let mut issues = prepared.issues.clone();

        let mut geo = GeoScript::default();
        geo.emit(format!("// Gmsh model of design `{}`", design.name()));
        geo.emit("SetFactory(\"OpenCASCADE\");");
        geo.emit("Geometry.OCCBooleanPreserveNumbering = 1;");

        // chip -> name -> (variables, kind); names that clean to the same text share a group
        let mut metals: IndexMap<ArcStr, IndexMap<String, (Vec<String>, Metal)>> = IndexMap::new();
        let mut next_metal = 0usize;
        let mut cuts: IndexMap<ArcStr, Vec<u64>> = IndexMap::new();

        for kind in ElementKind::ALL {
            if kind == ElementKind::Junction && request.skip_junctions {
                continue;
            }
            for row in prepared.rows(kind) {
                if row.width() == Some(0) {
                    tracing::debug!(element = %row.name, "skipping zero-width path");
                    continue;
                }
                let z = design
                    .get_chip_z(&row.chip)
                    .map(to_db_units)
                    .unwrap_or_default();
                let name = geometry_name(design, row);
                geo.comment(format!("{kind} {name}"));
                let surfaces = geo.shape(&row.geometry, z);
                if row.subtract {
                    cuts.entry(row.chip.clone()).or_default().extend(surfaces);
                } else {
                    let var = format!("m{next_metal}");
                    next_metal += 1;
                    geo.bind_union(&var, &surfaces);
                    let metal = if kind == ElementKind::Junction {
                        Metal::Junction
                    } else {
                        Metal::Trace
                    };
                    metals
                        .entry(row.chip.clone())
                        .or_default()
                        .entry(name)
                        .or_insert_with(|| (Vec::new(), metal))
                        .0
                        .push(var);
                }
            }
        }

        for (component, pin) in &prepared.open_pins {
            let z = design
                .get_chip_z(&pin.chip)
                .map(to_db_units)
                .unwrap_or_default();
            geo.comment(format!("endcap {}_{}", component, pin.name));
            let s = geo.rectangle(endcap(pin), z);
            cuts.entry(pin.chip.clone()).or_default().push(s);
        }

        // The union of the selected rows in every table, grown by the buffers and not clamped.
        let fitted = prepared
            .tables
            .path_poly_and_junction
            .iter()
            .map(|(_, row)| &row.geometry)
            .collect::<Vec<_>>()
            .bbox()
            .map(|r| r.expand_xy(x_buffer, y_buffer));

        // chip -> (ground variable, substrate volume, footprint)
        let mut chips: IndexMap<ArcStr, (String, u64, Rect)> = IndexMap::new();
        for (i, chip) in design.chips().keys().enumerate() {
            let dims = match design.chip_dims(chip) {
                Ok(dims) => dims,
                Err(_) => {
                    issues.add(RenderIssue::warn(RenderCause::BadChipSize { chip: chip.clone() }));
                    continue;
                }
            };
            let footprint = match fitted {
                Some(b) if request.box_plus_buffer => b,
                _ => dims.rect(),
            };
            geo.comment(format!("chip {chip}"));
            let ground = format!("gnd{i}");
            let plane = geo.rectangle(footprint, dims.center_z);
            geo.bind_union(&ground, &[plane]);
            let substrate = geo.cuboid(footprint, dims.center_z, dims.size_z);
            chips.insert(chip.clone(), (ground, substrate, footprint));
        }

        let (top, bottom) = sample_holder(design)?;
        let vacuum_rect = chips
            .values()
            .map(|(_, _, r)| *r)
            .reduce(Rect::union)
            .map(|r| r.expand_all(VACUUM_TOLERANCE));
        let vacuum = vacuum_rect.map(|r| {
            geo.comment("vacuum box");
            let v = geo.cuboid(r, -bottom, top + bottom);
            geo.emit(format!("vb_sfs() = Boundary{{ Volume{{{v}}}; }};"));
            v
        });

        for (chip, (ground, _, _)) in &chips {
            if let Some(surfaces) = cuts.get(chip).filter(|s| !s.is_empty()) {
                geo.emit(format!(
                    "{ground}() = BooleanDifference{{ Surface{{{ground}()}}; Delete; }}{{ Surface{{{}}}; Delete; }};",
                    join(surfaces)
                ));
            }
        }

        for (chip, (ground, substrate, _)) in &chips {
            let mut members: Vec<String> = metals
                .get(chip)
                .map(|m| m.values().flat_map(|(v, _)| v.iter().cloned()).collect())
                .unwrap_or_default();
            members.push(ground.clone());
            geo.emit(format!(
                "BooleanFragments{{ Volume{{{substrate}}}; Delete; }}{{ Surface{{{}}}; Delete; }}",
                vars(&members)
            ));
            if let Some(v) = vacuum {
                geo.emit(format!(
                    "BooleanFragments{{ Volume{{{substrate}}}; Delete; }}{{ Volume{{{v}}}; Delete; }}"
                ));
            }
        }

        geo.comment("physical groups");
        for geoms in metals.values() {
            for (name, (vs, _)) in geoms {
                geo.physical(name.as_str(), 2, &vars(vs));
            }
        }
        let grounds: Vec<String> = chips.values().map(|(g, _, _)| g.clone()).collect();
        if !grounds.is_empty() {
            geo.physical("ground_plane", 2, &vars(&grounds));
            geo.physical(
                "dielectric_substrate",
                3,
                &join(chips.values().map(|(_, s, _)| s)),
            );
        }
        if let Some(v) = vacuum {
            geo.physical("vacuum_box", 3, &v.to_string());
            geo.physical("vacuum_box_sfs", 2, "vb_sfs()");
        }

        let color = |path: &[&str]| -> Result<String, RenderError> {
            match opts.get(path).and_then(|v| v.as_list()) {
                Some(c) => Ok(join(c)),
                None => Err(RenderError::InvalidOption {
                    renderer: NAME,
                    option: path.join("."),
                    value: "<missing>".to_string(),
                }),
            }
        };
        for (metal, key) in [(Metal::Trace, "metal"), (Metal::Junction, "jj")] {
            let members: Vec<String> = metals
                .values()
                .flat_map(|m| m.values())
                .filter(|(_, k)| *k == metal)
                .flat_map(|(v, _)| v.iter().cloned())
                .collect();
            if !members.is_empty() {
                let c = color(&["colors", key])?;
                geo.emit(format!("Color {{{c}}}{{ Surface{{{}}}; }}", vars(&members)));
            }
        }
        if !chips.is_empty() {
            let c = color(&["colors", "sub"])?;
            geo.emit(format!(
                "Color {{{c}}}{{ Volume{{{}}}; }}",
                join(chips.values().map(|(_, s, _)| s))
            ));
        }

        let mut members: Vec<String> = metals
            .values()
            .flat_map(|m| m.values().flat_map(|(v, _)| v.iter().cloned()))
            .collect();
        members.extend(grounds);
        write_mesh_settings(&mut geo, &opts, &members)?;

        tracing::info!(
            design = %design.name(),
            groups = geo.groups.len(),
            "rendered gmsh model"
        );
        Ok(GmshModel {
            script: geo.text,
            groups: geo.groups,
            issues,
        })
    }
}

/// The physical group name of a metal row: `{component}_{element}`.
pub(crate) fn geometry_name(design: &Design, row: &QGeometryRow) -> String {
    let component = super::component_name(design, row.component);
    format!("{}_{}", clean_name(&component), clean_name(&row.name))
}

/// Sample holder top and bottom, from the design variables or the first chip.
fn sample_holder(design: &Design) -> Result<(i64, i64), RenderError> {
    let lookup = |key: &str| -> Option<i64> {
        let raw = match design.get_variable("sample_holder_top") {
            Some(_) => design.get_variable(key)?,
            None => design.get_chip_size(design.chips().keys().next()?)?.get(key)?,
        };
        parse_raw(raw, design.variables())
            .ok()?
            .as_number()
            .map(to_db_units)
    };
    match (lookup("sample_holder_top"), lookup("sample_holder_bottom")) {
        (Some(top), Some(bottom)) => Ok((top, bottom)),
        _ => Err(RenderError::InvalidOption {
            renderer: NAME,
            option: "sample_holder_top".to_string(),
            value: "<missing>".to_string(),
        }),
    }
}

fn write_mesh_settings(
    geo: &mut GeoScript,
    opts: &RendererOptions,
    members: &[String],
) -> Result<(), RenderError> {
    let min_size = opts.length(&["mesh", "min_size"])?;
    let max_size = opts.length(&["mesh", "max_size"])?;
    let fields = |key: &str| opts.length(&["mesh", "mesh_size_fields", key]);
    let dist_min = fields("min_distance_from_edges")?;
    let dist_max = fields("max_distance_from_edges")?;
    let dist_delta = fields("distance_delta")?;
    let grad_delta = fields("gradient_delta")?;
    if dist_delta <= 0 {
        return Err(RenderError::InvalidOption {
            renderer: NAME,
            option: "mesh.mesh_size_fields.distance_delta".to_string(),
            value: mm(dist_delta).to_string(),
        });
    }
    let grad_steps = (dist_max - dist_min) / dist_delta;

    geo.comment("mesh size fields");
    if !members.is_empty() {
        geo.emit(format!(
            "metal_curves() = Boundary{{ Surface{{{}}}; }};",
            vars(members)
        ));
        let distance = geo.field("Distance");
        geo.set_field(distance, "CurvesList", "{metal_curves()}");
        geo.set_field(distance, "Sampling", 100);

        let mut thresholds = Vec::new();
        for i in 0..grad_steps {
            let f = geo.field("Threshold");
            geo.set_field(f, "InField", distance);
            geo.set_field(f, "DistMin", mm(dist_min));
            geo.set_field(f, "DistMax", mm(dist_max - (grad_steps - i - 1) * dist_delta));
            geo.set_field(f, "Sigmoid", 1);
            geo.set_field(f, "SizeMin", mm(i * grad_delta + min_size));
            geo.set_field(f, "SizeMax", mm(max_size));
            thresholds.push(f);
        }
        let min = geo.field("Min");
        geo.set_field(min, "FieldsList", format!("{{{}}}", join(thresholds)));
        geo.emit(format!("Background Field = {min};"));
    }
    geo.emit("Mesh.MeshSizeExtendFromBoundary = 0;");

    geo.emit(format!(
        "Mesh.MeshSizeFromCurvature = {};",
        opts.number(&["mesh", "nodes_per_2pi_curve"])?
    ));
    geo.emit(format!("Mesh.Smoothing = {};", opts.number(&["mesh", "smoothing"])?));
    geo.emit(format!(
        "Mesh.Algorithm3D = {};",
        opts.number(&["mesh", "algorithm_3d"])?
    ));
    geo.emit(format!(
        "General.NumThreads = {};",
        opts.number(&["mesh", "num_threads"])?
    ));
    geo.emit(format!("Mesh.MeshSizeMin = {};", mm(min_size)));
    geo.emit(format!("Mesh.MeshSizeMax = {};", mm(max_size)));
    Ok(())
}

impl Renderer for GmshRenderer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn default_options(&self) -> Options {
        default_options()
    }

    fn start(&mut self) {
        self.initiated = true;
        tracing::debug!(renderer = NAME, "started");
    }

    fn stop(&mut self) {
        self.initiated = false;
        tracing::debug!(renderer = NAME, "stopped");
    }

    fn is_initiated(&self) -> bool {
        self.initiated
    }

    fn render_design(
        &self,
        design: &Design,
        request: &RenderRequest,
    ) -> Result<RenderOutput, RenderError> {
        let model = self.build_model(design, request)?;
        let mut files = IndexMap::new();
        files.insert(format!("{}.geo", design.name()), model.script);
        Ok(RenderOutput {
            files,
            issues: model.issues,
        })
    }
}
