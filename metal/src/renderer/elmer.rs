//! ElmerFEM capacitance simulation input.
//!
//! The mesh comes from the [Gmsh renderer](super::gmsh). This module groups
//! the metal into nets and writes the solver input file (`.sif`) that asks
//! ElmerSolver for the capacitance matrix between the nets.

use std::collections::BTreeMap;

use arcstr::ArcStr;
use ena::unify::{InPlaceUnificationTable, UnifyKey};
use geometry::prelude::*;
use indexmap::IndexMap;
use itertools::Itertools;
use rust_decimal::Decimal;

use super::gmsh::{geometry_name, GmshModel, GmshRenderer};
use super::{prepare, RenderError, RenderOutput, RenderRequest, Renderer, RendererOptions};
use crate::design::Design;
use crate::parse::{options, Options, RawValue, Value};
use crate::qgeometry::{ElementKind, QGeometryRow};

/// The renderer name.
pub const NAME: &str = "elmer";

/// Geometry names grouped by net ID. IDs are dense and start at 0.
pub type NetList = BTreeMap<usize, Vec<String>>;

const SIF_HEADER: &str = "Header\n  CHECK KEYWORDS \"Warn\"\n  Mesh DB \".\" \".\"\nEnd\n\n";

/// The default options.
pub fn default_options() -> Options {
    options([
        ("simulation_type", RawValue::from("steady_3D")),
        ("simulation_dir", "./simdata".into()),
        ("mesh_file", "out.msh".into()),
        ("simulation_input_file", "case.sif".into()),
        ("postprocessing_file", "case.msh".into()),
        ("output_file", "case.result".into()),
        (
            "capacitance",
            RawValue::Table(options([
                ("Calculate_Electric_Field", RawValue::Bool(true)),
                ("Calculate_Electric_Energy", RawValue::Bool(true)),
                ("Calculate_Capacitance_Matrix", RawValue::Bool(true)),
                ("Capacitance_Matrix_Filename", "cap_matrix.txt".into()),
                ("Linear_System_Solver", "Iterative".into()),
                ("Steady_State_Convergence_Tolerance", RawValue::Float(1.0e-5)),
                ("Nonlinear_System_Convergence_Tolerance", RawValue::Float(1.0e-7)),
                ("Nonlinear_System_Max_Iterations", RawValue::Int(20)),
                ("Linear_System_Convergence_Tolerance", RawValue::Float(1.0e-10)),
                ("Linear_System_Max_Iterations", RawValue::Int(500)),
                ("Linear_System_Iterative_Method", "BiCGStab".into()),
                ("BiCGstabl_Polynomial_Degree", RawValue::Int(2)),
            ])),
        ),
        (
            "materials",
            RawValue::List(vec!["vacuum".into(), "silicon".into()]),
        ),
        (
            "constants",
            RawValue::Table(options([
                ("Permittivity_of_Vacuum", RawValue::Float(8.8542e-12)),
                ("Unit_Charge", RawValue::Float(1.602e-19)),
            ])),
        ),
    ])
}

/// Which layers hold metal and which hold dielectric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerTypes {
    /// Metal layers. Only these take part in net assignment.
    pub metal: Vec<i64>,
    /// Dielectric layers.
    pub dielectric: Vec<i64>,
}

impl Default for LayerTypes {
    fn default() -> Self {
        Self {
            metal: vec![1],
            dielectric: vec![3],
        }
    }
}

fn simulation_preset(name: &str) -> Option<Vec<(&'static str, String)>> {
    match name {
        "steady_3D" => Some(vec![
            ("Max Output Level", "5".into()),
            ("Coordinate System", "Cartesian".into()),
            ("Coordinate Mapping(3)", "1 2 3".into()),
            ("Simulation Type", "Steady state".into()),
            ("Steady State Max Iterations", "1".into()),
            ("Output Intervals", "1".into()),
            ("Timestepping Method", "BDF".into()),
            ("BDF Order", "1".into()),
            ("Solver Input File", "case.sif".into()),
            ("Post File", "case.ep".into()),
            ("Output File", "case.result".into()),
        ]),
        _ => None,
    }
}

fn capacitance_solver() -> Vec<(String, String)> {
    [
        ("Equation", "Electrostatics"),
        ("Calculate Electric Field", "True"),
        ("Calculate Capacitance Matrix", "True"),
        ("Capacitance Matrix Filename", "capacitance.txt"),
        ("Procedure", "\"StatElecSolve\" \"StatElecSolver\""),
        ("Variable", "Potential"),
        ("Calculate Electric Energy", "True"),
        ("Exec Solver", "Always"),
        ("Stabilize", "True"),
        ("Bubbles", "False"),
        ("Lumped Mass Matrix", "False"),
        ("Optimize Bandwidth", "True"),
        ("Steady State Convergence Tolerance", "1.0e-5"),
        ("Nonlinear System Convergence Tolerance", "1.0e-7"),
        ("Nonlinear System Max Iterations", "20"),
        ("Nonlinear System Newton After Iterations", "3"),
        ("Nonlinear System Newton After Tolerance", "1.0e-3"),
        ("Nonlinear System Relaxation Factor", "1"),
        ("Linear System Solver", "Iterative"),
        ("Linear System Iterative Method", "BiCGStab"),
        ("Linear System Max Iterations", "500"),
        ("Linear System Convergence Tolerance", "1.0e-10"),
        ("BiCGstabl polynomial degree", "2"),
        ("Linear System Preconditioning", "ILU0"),
        ("Linear System ILUT Tolerance", "1.0e-3"),
        ("Linear System Abort Not Converged", "False"),
        ("Linear System Residual Output", "10"),
        ("Linear System Precondition Recompute", "1"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn material(name: &str) -> Option<Vec<(&'static str, &'static str)>> {
    match name {
        "vacuum" => Some(vec![
            ("Electric Conductivity", "0.0"),
            ("Relative Permittivity", "1"),
        ]),
        "silicon" => Some(vec![("Relative Permittivity", "11.45")]),
        _ => None,
    }
}

/// Formats a parsed option as a SIF value.
fn sif_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::List(items) => items.iter().map(sif_value).join(" "),
        other => other.to_string(),
    }
}

/// Option keys are written with underscores; SIF keys use spaces.
fn sif_key(key: &str) -> String {
    key.replace('_', " ")
}

fn section(out: &mut String, comment: Option<&str>, title: &str, entries: &[(String, String)]) {
    if let Some(comment) = comment {
        out.push_str(&format!("! {comment}\n"));
    }
    out.push_str(title);
    out.push('\n');
    for (k, v) in entries {
        out.push_str(&format!("  {k} = {v}\n"));
    }
    out.push_str("End\n\n");
}

fn targets(kind: &str, tags: &[u64]) -> (String, String) {
    (
        format!("Target {kind}({})", tags.len()),
        tags.iter().join(" "),
    )
}

/// Thickness and z coordinate of a layer's base datatype, in millimeters.
fn layer_geometry(design: &Design, layer: i64) -> Option<(Decimal, Decimal)> {
    design
        .layer_stack()
        .get_thickness_zcoord_for_layer_datatype(layer, 0)
}

/// Groups metal rows into nets.
///
/// Zero-width paths draw nothing and join no net. Rows are considered from
/// the lowest layer up. Two rows share a net when their shapes touch, they
/// are on the same chip and their layers touch: the same layer, the same z,
/// or one stacked directly on the other.
pub fn assign_nets(
    design: &Design,
    rows: &[(ElementKind, &QGeometryRow)],
    metal_layers: &[i64],
) -> NetList {
    let mut metal: Vec<&QGeometryRow> = rows
        .iter()
        .filter(|(kind, row)| {
            *kind != ElementKind::Junction
                && !row.subtract
                && !row.helper
                && row.width() != Some(0)
                && metal_layers.contains(&row.layer)
        })
        .map(|(_, row)| *row)
        .collect();
    let min_z = |row: &QGeometryRow| {
        layer_geometry(design, row.layer).map(|(t, z)| (z + t).min(z))
    };
    metal.sort_by_key(|row| min_z(*row));

    let layers_touch = |a: &QGeometryRow, b: &QGeometryRow| {
        if a.layer == b.layer {
            return true;
        }
        match (layer_geometry(design, a.layer), layer_geometry(design, b.layer)) {
            (Some((ta, za)), Some((tb, zb))) => za == zb || za + ta == zb || zb + tb == za,
            _ => false,
        }
    };

    let mut table: InPlaceUnificationTable<MetalKey> = InPlaceUnificationTable::new();
    let keys: Vec<MetalKey> = metal.iter().map(|_| table.new_key(())).collect();
    for i in 0..metal.len() {
        for j in (i + 1)..metal.len() {
            let (a, b) = (metal[i], metal[j]);
            if a.chip == b.chip && layers_touch(a, b) && a.geometry.touches(&b.geometry) {
                table.union(keys[i], keys[j]);
            }
        }
    }

    let mut ids: IndexMap<MetalKey, usize> = IndexMap::new();
    let mut nets = NetList::new();
    for (key, row) in keys.iter().zip(&metal) {
        let root = table.find(*key);
        let next = ids.len();
        let id = *ids.entry(root).or_insert(next);
        nets.entry(id).or_default().push(geometry_name(design, row));
    }
    tracing::debug!(nets = nets.len(), geometries = metal.len(), "assigned nets");
    nets
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
struct MetalKey(u32);

impl UnifyKey for MetalKey {
    type Value = ();

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        Self(u)
    }

    fn tag() -> &'static str {
        "MetalKey"
    }
}

/// Writes the mesh script and the ElmerFEM capacitance setup.
#[derive(Debug, Clone)]
pub struct ElmerRenderer {
    gmsh: GmshRenderer,
    overrides: Options,
    layer_types: LayerTypes,
    initiated: bool,
}

impl Default for ElmerRenderer {
    fn default() -> Self {
        Self::new(Options::new(), Options::new())
    }
}

impl ElmerRenderer {
    /// Creates a renderer with Elmer and Gmsh option overrides. The renderer is not started.
    pub fn new(overrides: Options, gmsh_overrides: Options) -> Self {
        Self {
            gmsh: GmshRenderer::new(gmsh_overrides),
            overrides,
            layer_types: LayerTypes::default(),
            initiated: false,
        }
    }

    /// Sets which layers are metal and which are dielectric.
    pub fn with_layer_types(mut self, layer_types: LayerTypes) -> Self {
        self.layer_types = layer_types;
        self
    }

    /// The layer types.
    pub fn layer_types(&self) -> &LayerTypes {
        &self.layer_types
    }

    /// The wrapped Gmsh renderer.
    pub fn gmsh(&self) -> &GmshRenderer {
        &self.gmsh
    }

    /// Groups the selected metal into nets.
    pub fn nets(&self, design: &Design, request: &RenderRequest) -> Result<NetList, RenderError> {
        let prepared = prepare(design, request, 0, 0)?;
        Ok(assign_nets(
            design,
            &prepared.tables.path_and_poly,
            &self.layer_types.metal,
        ))
    }

    fn write_sif(
        &self,
        opts: &RendererOptions,
        model: &GmshModel,
        nets: &NetList,
    ) -> Result<String, RenderError> {
        let invalid = |option: &str, value: &str| RenderError::InvalidOption {
            renderer: NAME,
            option: option.to_string(),
            value: value.to_string(),
        };
        let group = |name: &str| {
            model
                .group(name)
                .map(|g| g.tag)
                .ok_or_else(|| invalid("physical group", name))
        };

        let mut out = String::from(SIF_HEADER);

        let sim_type = opts.text(&["simulation_type"])?;
        let mut simulation: Vec<(String, String)> = simulation_preset(&sim_type)
            .ok_or_else(|| invalid("simulation_type", &sim_type))?
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        for (key, option) in [
            ("Solver Input File", "simulation_input_file"),
            ("Output File", "output_file"),
        ] {
            let value = opts.text(&[option])?;
            if let Some(entry) = simulation.iter_mut().find(|(k, _)| k == key) {
                entry.1 = value;
            }
        }
        section(&mut out, Some(sim_type.as_str()), "Simulation", &simulation);

        let constants: Vec<(String, String)> = opts
            .get(&["constants"])
            .and_then(Value::as_map)
            .map(|m| m.iter().map(|(k, v)| (sif_key(k), sif_value(v))).collect())
            .unwrap_or_default();
        if !constants.is_empty() {
            section(&mut out, None, "Constants", &constants);
        }

        let solvers = ["capacitance", "postprocessing_gmsh"];
        out.push_str("! poisson\nEquation 1\n");
        for (i, solver) in solvers.iter().enumerate() {
            out.push_str(&format!("  ! {}: {solver}\n", i + 1));
        }
        let active: Vec<String> = (1..=solvers.len()).map(|i| i.to_string()).collect();
        out.push_str(&format!(
            "  Active Solvers({}) = {}\nEnd\n\n",
            solvers.len(),
            active.join(" ")
        ));

        let mut capacitance = capacitance_solver();
        if let Some(setup) = opts.get(&["capacitance"]).and_then(Value::as_map) {
            for (k, v) in setup {
                let key = sif_key(k);
                let value = sif_value(v);
                match capacitance
                    .iter_mut()
                    .find(|(existing, _)| existing.eq_ignore_ascii_case(&key))
                {
                    Some(entry) => entry.1 = value,
                    None => capacitance.push((key, value)),
                }
            }
        }
        capacitance.push(("Capacitance Bodies".to_string(), nets.len().to_string()));
        section(&mut out, Some("capacitance"), "Solver 1", &capacitance);

        let post_stem = opts
            .text(&["postprocessing_file"])?
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string();
        let postprocessing: Vec<(String, String)> = [
            ("Exec Solver", "Always".to_string()),
            ("Equation", "Result Output".to_string()),
            (
                "Procedure",
                "\"ResultOutputSolve\" \"ResultOutputSolver\"".to_string(),
            ),
            ("Output File Name", format!("\"{post_stem}\"")),
            ("Output Format", "gmsh".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        section(&mut out, Some("postprocessing_gmsh"), "Solver 2", &postprocessing);

        let materials: Vec<ArcStr> = opts
            .get(&["materials"])
            .and_then(Value::as_list)
            .ok_or_else(|| invalid("materials", "<missing>"))?
            .iter()
            .map(|v| v.as_text().cloned().ok_or_else(|| invalid("materials", &v.to_string())))
            .collect::<Result<_, _>>()?;
        for (i, name) in materials.iter().enumerate() {
            let props = material(name).ok_or_else(|| invalid("materials", name))?;
            let entries: Vec<(String, String)> = props
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            section(&mut out, Some(name.as_str()), &format!("Material {}", i + 1), &entries);
        }

        let mut bodies: Vec<(&str, u64, usize, &ArcStr)> = Vec::new();
        for (i, name) in materials.iter().enumerate() {
            match name.as_str() {
                "vacuum" => bodies.push(("vacuum_box", group("vacuum_box")?, i + 1, name)),
                "silicon" => bodies.push((
                    "dielectric_substrate",
                    group("dielectric_substrate")?,
                    i + 1,
                    name,
                )),
                _ => {}
            }
        }
        for (i, (body, tag, material, material_name)) in bodies.iter().enumerate() {
            let entries = vec![
                targets("Bodies", &[*tag]),
                ("Equation".to_string(), "1 ! poisson".to_string()),
                ("Material".to_string(), format!("{material} ! {material_name}")),
            ];
            section(&mut out, Some(*body), &format!("Body {}", i + 1), &entries);
        }

        let mut boundary = 0;
        for (net, names) in nets {
            let tags: Vec<u64> = names
                .iter()
                .filter_map(|name| model.group(name).map(|g| g.tag))
                .collect();
            let Some(label) = names.last() else {
                continue;
            };
            boundary += 1;
            let entries = vec![
                targets("Boundaries", &tags),
                ("Capacitance Body".to_string(), (net + 1).to_string()),
            ];
            section(
                &mut out,
                Some(label.as_str()),
                &format!("Boundary Condition {boundary}"),
                &entries,
            );
        }
        boundary += 1;
        section(
            &mut out,
            Some("ground_plane"),
            &format!("Boundary Condition {boundary}"),
            &[
                targets("Boundaries", &[group("ground_plane")?]),
                ("Capacitance Body".to_string(), "0".to_string()),
            ],
        );
        boundary += 1;
        section(
            &mut out,
            Some("FarField"),
            &format!("Boundary Condition {boundary}"),
            &[
                targets("Boundaries", &[group("vacuum_box_sfs")?]),
                ("Electric Infinity BC".to_string(), "True".to_string()),
            ],
        );
        Ok(out)
    }
}

impl Renderer for ElmerRenderer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn default_options(&self) -> Options {
        default_options()
    }

    fn start(&mut self) {
        self.gmsh.start();
        self.initiated = true;
        tracing::debug!(renderer = NAME, "started");
    }

    fn stop(&mut self) {
        self.gmsh.stop();
        self.initiated = false;
        tracing::debug!(renderer = NAME, "stopped");
    }

    fn is_initiated(&self) -> bool {
        self.initiated && self.gmsh.is_initiated()
    }

    fn render_design(
        &self,
        design: &Design,
        request: &RenderRequest,
    ) -> Result<RenderOutput, RenderError> {
        if !self.is_initiated() {
            return Err(RenderError::NotInitiated(NAME));
        }
        let opts = RendererOptions::new(NAME, default_options(), &self.overrides, design.variables())?;
        let mut model = self.gmsh.build_model(design, request)?;
        let nets = self.nets(design, request)?;

        let mesh_file = opts.text(&["mesh_file"])?;
        model.script.push_str(&format!("Mesh 3;\nSave \"{mesh_file}\";\n"));

        let sif = self.write_sif(&opts, &model, &nets)?;
        let sim_dir = opts.text(&["simulation_dir"])?;
        let sif_name = opts.text(&["simulation_input_file"])?;
        let in_sim_dir = |name: &str| {
            std::path::Path::new(&sim_dir)
                .join(name)
                .to_string_lossy()
                .into_owned()
        };

        let mut files = IndexMap::new();
        files.insert(format!("{}.geo", design.name()), model.script);
        files.insert(in_sim_dir(&sif_name), sif);
        files.insert(in_sim_dir("ELMERSOLVER_STARTINFO"), sif_name);
        tracing::info!(design = %design.name(), nets = nets.len(), "rendered elmer setup");
        Ok(RenderOutput {
            files,
            issues: model.issues,
        })
    }
}
