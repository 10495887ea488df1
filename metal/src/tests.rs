use std::path::PathBuf;
use std::sync::Arc;

use approx::assert_relative_eq;
use arcstr::ArcStr;
use diagnostics::{Diagnostic, Severity};
use geometry::prelude::*;

use crate::component::pin::PinInputError;
use crate::component::{ComponentClass, MakeContext, Status};
use crate::design::{ChipLookup, Design, SelectionCase, Variant};
use crate::id::{ComponentId, NetId};
use crate::layer_stack::LayerStack;
use crate::net::NetRow;
use crate::parse::{options, Options, RawValue};
use crate::qgeometry::ElementKind;
use crate::renderer::ansys::{AnsysRenderer, Axis, Command};
use crate::renderer::elmer::ElmerRenderer;
use crate::renderer::gmsh::GmshRenderer;
use crate::renderer::{RenderCause, RenderError, RenderRequest, Renderer};
use crate::validation::Cause;
use crate::{Error, Result};

const DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data");

fn data(path: &str) -> PathBuf {
    PathBuf::from(DATA_DIR).join(path)
}

fn pin_inputs(start: (&str, &str), end: (&str, &str)) -> Options {
    let pin = |(component, pin): (&str, &str)| {
        RawValue::Table(options([("component", component), ("pin", pin)]))
    };
    let mut opts = Options::new();
    opts.insert(
        "pin_inputs".into(),
        RawValue::Table(options([("start_pin", pin(start)), ("end_pin", pin(end))])),
    );
    opts
}

/// Two facing pads at x = -1mm and x = 1mm joined by a trace named `cpw`.
fn two_pads() -> Result<Design> {
    let mut design = Design::planar();
    design.add_component("pad", Some("left"), options([("pos_x", "-1mm")]), true)?;
    design.add_component(
        "pad",
        Some("right"),
        options([("pos_x", "1mm"), ("orientation", "180")]),
        true,
    )?;
    design.add_component(
        "route_straight",
        Some("cpw"),
        pin_inputs(("left", "tie"), ("right", "tie")),
        true,
    )?;
    Ok(design)
}

/// Two unconnected pads and a junction `q` centered at (0, 1mm).
fn pads_and_junction() -> Result<Design> {
    let mut design = Design::planar();
    design.add_component("pad", Some("left"), options([("pos_x", "-1mm")]), true)?;
    design.add_component(
        "pad",
        Some("right"),
        options([("pos_x", "1mm"), ("orientation", "180")]),
        true,
    )?;
    design.add_component(
        "junction",
        Some("q"),
        options([("pos_y", "1mm"), ("jj_width", "40um")]),
        true,
    )?;
    Ok(design)
}

#[test_log::test]
fn generated_names_count_per_prefix() -> Result<()> {
    let mut design = Design::planar();
    let a = design.add_component("rectangle", None, Options::new(), true)?;
    let b = design.add_component("rectangle", None, Options::new(), true)?;
    let c = design.add_component("pad", None, Options::new(), true)?;
    let name = |id| design.component_by_id(id).unwrap().name().clone();
    assert_eq!(name(a), "rect_1");
    assert_eq!(name(b), "rect_2");
    assert_eq!(name(c), "pad_1");

    design.delete_all_components();
    assert_eq!(design.num_components(), 0);
    assert!(design.qgeometry().is_empty());
    let d = design.add_component("rectangle", None, Options::new(), true)?;
    assert_eq!(design.component_by_id(d).unwrap().name(), "rect_1");
    assert_eq!(d.raw(), 1);
    Ok(())
}

#[test_log::test]
fn used_names_need_overwrite() -> Result<()> {
    let mut design = Design::planar();
    let first = design.add_component("rectangle", Some("box"), Options::new(), true)?;
    let err = design
        .add_component("rectangle", Some("box"), Options::new(), true)
        .unwrap_err();
    assert!(matches!(err, Error::NameInUse(name) if name == "box"));

    design.set_overwrite_enabled(true);
    let second = design.add_component(
        "rectangle",
        Some("box"),
        options([("width", "1mm")]),
        true,
    )?;
    assert_ne!(first, second);
    assert_eq!(design.num_components(), 1);
    assert!(design.component_by_id(first).is_none());
    assert_eq!(
        design.qgeometry_bounds(second),
        Rect::from_sides(-500_000, -150_000, 500_000, 150_000)
    );
    Ok(())
}

#[test_log::test]
fn rename_keeps_rows_and_id() -> Result<()> {
    let mut design = two_pads()?;
    let id = design.find_id("left").unwrap();
    design.rename_component(id, "launch")?;
    assert_eq!(design.find_id("launch"), Some(id));
    assert!(design.find_id("left").is_none());
    assert_eq!(design.qgeometry().get_component(id).len(), 2);
    assert!(matches!(
        design.rename_component(id, "right"),
        Err(Error::NameInUse(_))
    ));
    Ok(())
}

#[test_log::test]
fn delete_disconnects_partner_pins() -> Result<()> {
    let mut design = two_pads()?;
    assert!(design.component("left").unwrap().pin("tie").unwrap().is_connected());
    design.delete_component("cpw")?;

    let tie = design.component("left").unwrap().pin("tie").unwrap();
    assert_eq!(tie.net_id, NetId::UNCONNECTED);
    assert!(design.net_info().is_empty());
    assert!(design.qgeometry().rows(ElementKind::Path).is_empty());
    assert!(matches!(
        design.delete_component("cpw"),
        Err(Error::ComponentNotFound(_))
    ));
    Ok(())
}

#[test_log::test]
fn connect_pins_refuses_pins_in_use() -> Result<()> {
    let mut design = pads_and_junction()?;
    let net = design.connect_pins("left", "tie", "q", "a");
    assert!(!net.is_zero());
    assert_eq!(design.component("q").unwrap().pin("a").unwrap().net_id, net);

    assert!(design.connect_pins("right", "tie", "q", "a").is_zero());
    assert!(design.connect_pins("right", "tie", "q", "c").is_zero());
    assert!(design.connect_pins("nobody", "tie", "q", "b").is_zero());
    assert_eq!(design.net_info().net_ids().len(), 1);
    assert!(!design.validate().has_error());
    Ok(())
}

#[test_log::test]
fn rebuild_follows_variables() -> Result<()> {
    let mut design = two_pads()?;
    design.set_variable("cpw_width", "15um");
    assert_eq!(design.rebuild(), 0);

    let trace = design
        .qgeometry()
        .rows(ElementKind::Path)
        .iter()
        .find(|row| row.name == "trace")
        .unwrap();
    assert_eq!(trace.width(), Some(15_000));
    assert_eq!(design.net_info().net_ids().len(), 2);
    assert!(!design.validate().has_error());
    Ok(())
}

#[test_log::test]
fn update_options_applies_on_rebuild() -> Result<()> {
    let mut design = Design::planar();
    let id = design.add_component("rectangle", Some("r"), Options::new(), true)?;
    design.update_options("r", &options([("height", "100um")]))?;
    assert_eq!(design.qgeometry_bounds(id).height(), 300_000);
    design.rebuild_component(id)?;
    assert_eq!(design.qgeometry_bounds(id).height(), 100_000);
    Ok(())
}

#[test]
fn chip_queries() {
    let mut design = Design::planar();
    let dims = design.chip_dims("main").unwrap();
    assert_eq!((dims.size_x, dims.size_y, dims.size_z), (9_000_000, 6_000_000, -750_000));
    assert_eq!(
        design.get_x_y_for_chip("main"),
        (
            Some(Rect::from_sides(-4_500_000, -3_000_000, 4_500_000, 3_000_000)),
            ChipLookup::Ok
        )
    );
    assert_eq!(design.get_x_y_for_chip("other"), (None, ChipLookup::Missing));

    let mut chip = design.chips()["main"].clone();
    chip.size.insert("size_x".into(), "huge".into());
    design.set_chip("main", chip);
    assert_eq!(design.get_x_y_for_chip("main").1, ChipLookup::BadSize);
    assert_eq!(ChipLookup::BadSize.code(), 2);
}

#[test_log::test]
fn selection_cases() -> Result<()> {
    let design = two_pads()?;
    assert_eq!(design.get_unique_component_ids(&[]), (vec![], SelectionCase::All));
    assert_eq!(
        design.get_unique_component_ids(&["left", "right", "cpw", "left"]).1,
        SelectionCase::All
    );
    let (ids, case) = design.get_unique_component_ids(&["right", "right"]);
    assert_eq!(case, SelectionCase::Subset);
    assert_eq!(ids, vec![design.find_id("right").unwrap()]);
    assert_eq!(
        design.get_unique_component_ids(&["left", "ghost"]),
        (vec![], SelectionCase::Missing)
    );
    Ok(())
}

#[test_log::test]
fn bounds_fit_geometry_plus_buffer() -> Result<()> {
    let design = two_pads()?;
    let ids = [design.find_id("left").unwrap()];
    let tables = design.get_bounds_of_path_and_poly_tables(
        true,
        &ids,
        SelectionCase::Subset,
        200_000,
        100_000,
    );
    assert!(tables.chip_names_matched);
    assert_eq!(tables.path_and_poly.len(), 2);
    assert_eq!(
        tables.bounds,
        Some(Rect::from_sides(-1_298_000, -198_000, -702_000, 198_000))
    );

    let chip = design.get_bounds_of_path_and_poly_tables(false, &[], SelectionCase::All, 0, 0);
    assert_eq!(chip.bounds, design.get_x_y_for_chip("main").0);
    assert_eq!(chip.path_poly_and_junction.len(), 6);

    let missing = design.get_bounds_of_path_and_poly_tables(true, &[], SelectionCase::Missing, 0, 0);
    assert_eq!(missing.bounds, None);
    assert!(missing.path_and_poly.is_empty());
    Ok(())
}

#[test_log::test]
fn bounds_ignore_chips_when_stack_does_not_match() -> Result<()> {
    let mut design = two_pads()?;
    design.set_layer_stack(LayerStack::flip_chip());
    let tables = design.get_bounds_of_path_and_poly_tables(true, &[], SelectionCase::All, 0, 0);
    assert!(!tables.chip_names_matched);
    assert!(tables.valid_chip_names.is_empty());
    assert_eq!(
        tables.bounds,
        Some(Rect::from_sides(-1_098_000, -98_000, 1_098_000, 98_000))
    );

    let issues = design.validate();
    assert!(issues
        .iter()
        .any(|i| matches!(i.cause(), Cause::LayerStackChipsNotInDesign { .. })));
    Ok(())
}

#[test_log::test]
fn validation_reports_failed_components_and_layers() -> Result<()> {
    let mut design = Design::planar();
    design.add_component("rectangle", Some("r"), options([("layer", "7")]), true)?;
    design.add_component("pad", Some("bad"), options([("pad_height", "1um")]), true)?;
    let issues = design.validate();
    assert!(!issues.has_error());
    assert_eq!(issues.num_warnings(), 2);
    let causes: Vec<_> = issues.iter().map(|i| i.cause().clone()).collect();
    assert!(causes.contains(&Cause::FailedComponent {
        component: "bad".into()
    }));
    assert!(causes
        .iter()
        .any(|c| matches!(c, Cause::LayerNotInStack { layer: 7, .. })));
    Ok(())
}

#[test_log::test]
fn load_design_file() -> Result<()> {
    let design = Design::load(data("design.toml"))?;
    assert_eq!(design.name(), "two_pads");
    assert_eq!(design.notes(), "Two launch pads joined by a straight trace.");
    assert_eq!(design.layer_stack().rows().len(), 3);
    assert_eq!(design.chips()["main"].material, "sapphire");
    assert_eq!(design.num_components(), 4);
    assert!(design.components().all(|c| c.status() == Status::Good));

    let trace = design
        .qgeometry()
        .rows(ElementKind::Path)
        .iter()
        .find(|row| row.name == "trace")
        .unwrap();
    assert_eq!(trace.width(), Some(12_000));
    assert_eq!(design.net_info().net_ids().len(), 2);
    assert!(design.validate().is_empty());
    Ok(())
}

#[test_log::test]
fn save_then_load_keeps_components_and_connections() -> Result<()> {
    let mut design = pads_and_junction()?;
    design.set_name("saved");
    design.set_variable("cpw_gap", "8um");
    assert!(!design.connect_pins("left", "tie", "q", "a").is_zero());

    let path = std::env::temp_dir().join(format!("metal_roundtrip_{}.toml", std::process::id()));
    design.save(&path)?;
    let loaded = Design::load(&path)?;
    std::fs::remove_file(&path)?;

    assert_eq!(loaded.name(), "saved");
    assert_eq!(loaded.get_variable("cpw_gap"), Some(&RawValue::from("8um")));
    let names: Vec<&str> = loaded.components().map(|c| c.name().as_str()).collect();
    assert_eq!(names, ["left", "right", "q"]);
    let a = loaded.component("q").unwrap().pin("a").unwrap();
    let tie = loaded.component("left").unwrap().pin("tie").unwrap();
    assert!(a.is_connected());
    assert_eq!(a.net_id, tie.net_id);
    assert_eq!(loaded.to_file().connections, design.to_file().connections);
    Ok(())
}

#[test_log::test]
fn renderer_columns_reach_existing_rows() -> Result<()> {
    let mut design = pads_and_junction()?;
    design.register_renderer(&AnsysRenderer::hfss(Options::new()));
    let jj = &design.qgeometry().rows(ElementKind::Junction)[0];
    assert_eq!(jj.column("hfss_inductance"), Some(&RawValue::from("10nH")));
    assert!(design.renderers().any(|r| r == "hfss"));

    let id = design.add_component("junction", Some("q2"), options([("pos_y", "-1mm")]), true)?;
    let rows = design.qgeometry().get_component(id);
    let (_, jj2) = rows
        .iter()
        .find(|(kind, _)| *kind == ElementKind::Junction)
        .unwrap();
    assert_eq!(jj2.column("hfss_mesh_kw_jj"), Some(&RawValue::from("7um")));
    Ok(())
}

#[test_log::test]
fn renderers_must_be_started() -> Result<()> {
    let design = two_pads()?;
    let request = RenderRequest::default();
    let mut gmsh = GmshRenderer::default();
    assert_eq!(
        gmsh.render_design(&design, &request).unwrap_err(),
        RenderError::NotInitiated("gmsh")
    );
    gmsh.start();
    assert!(gmsh.render_design(&design, &request).is_ok());
    gmsh.stop();
    assert!(!gmsh.is_initiated());

    let hfss = AnsysRenderer::hfss(Options::new());
    assert_eq!(
        hfss.render_design(&design, &request).unwrap_err(),
        RenderError::NotInitiated("hfss")
    );
    Ok(())
}

#[test_log::test]
fn render_rejects_bad_requests() -> Result<()> {
    let design = two_pads()?;
    let mut gmsh = GmshRenderer::default();
    gmsh.start();

    let err = gmsh
        .render_design(&design, &RenderRequest::default().select(["left", "ghost"]))
        .unwrap_err();
    assert_eq!(err, RenderError::InvalidSelection(vec![ArcStr::from("ghost")]));

    let err = gmsh
        .render_design(&design, &RenderRequest::default().open_pin("left", "nope"))
        .unwrap_err();
    assert!(matches!(err, RenderError::InvalidPin { pin, .. } if pin == "nope"));

    let mut design = design;
    design.add_component("rectangle", Some("far"), options([("chip", "moon")]), true)?;
    let err = gmsh
        .render_design(&design, &RenderRequest::default())
        .unwrap_err();
    assert!(matches!(err, RenderError::UnknownChip { chip, .. } if chip == "moon"));
    Ok(())
}

#[test_log::test]
fn gmsh_model_names_metal_and_volumes() -> Result<()> {
    let design = two_pads()?;
    let mut gmsh = GmshRenderer::default();
    gmsh.start();
    let model = gmsh.build_model(&design, &RenderRequest::default().open_pin("cpw", "start"))?;

    for name in ["left_pad", "right_pad", "cpw_trace", "ground_plane", "vacuum_box_sfs"] {
        assert_eq!(model.group(name).map(|g| g.dim), Some(2), "{name}");
    }
    for name in ["dielectric_substrate", "vacuum_box"] {
        assert_eq!(model.group(name).map(|g| g.dim), Some(3), "{name}");
    }
    assert!(model.group("left_pocket").is_none());
    assert!(model.script.starts_with("// Gmsh model of design `my_design`"));
    assert!(model.script.contains("SetFactory(\"OpenCASCADE\");"));
    assert!(model.script.contains("BooleanDifference"));
    assert!(model.script.contains("Mesh.MeshSizeMax = 0.1;"));
    assert!(model.script.contains("Mesh.MeshSizeMin = 0.003;"));
    assert!(model.issues.is_empty());
    Ok(())
}

#[test_log::test]
fn gmsh_reports_bad_chip_sizes() -> Result<()> {
    let mut design = two_pads()?;
    let mut chip = design.chips()["main"].clone();
    chip.size.insert("size_z".into(), "thick".into());
    design.set_chip("main", chip);

    let mut gmsh = GmshRenderer::default();
    gmsh.start();
    let model = gmsh.build_model(&design, &RenderRequest::default())?;
    assert!(model
        .issues
        .iter()
        .any(|i| matches!(i.cause(), RenderCause::BadChipSize { chip } if chip == "main")));
    assert!(model.group("ground_plane").is_none());
    Ok(())
}

#[test_log::test]
fn elmer_groups_touching_metal_into_nets() -> Result<()> {
    let design = two_pads()?;
    let mut elmer = ElmerRenderer::default();
    elmer.start();
    let nets = elmer.nets(&design, &RenderRequest::default())?;
    assert_eq!(nets.len(), 1);
    assert_eq!(nets[&0].len(), 3);

    let separate = pads_and_junction()?;
    let nets = elmer.nets(&separate, &RenderRequest::default())?;
    assert_eq!(nets.len(), 4);

    let out = elmer.render_design(&separate, &RenderRequest::default())?;
    let files: Vec<&str> = out.files.keys().map(String::as_str).collect();
    assert_eq!(
        files,
        ["my_design.geo", "./simdata/case.sif", "./simdata/ELMERSOLVER_STARTINFO"]
    );
    assert!(out.files["my_design.geo"].ends_with("Mesh 3;\nSave \"out.msh\";\n"));
    let sif = &out.files["./simdata/case.sif"];
    assert!(sif.contains("Capacitance Bodies = 4"));
    assert!(sif.contains("Electric Infinity BC = True"));
    assert!(sif.contains("Capacitance Body = 0"));
    assert_eq!(out.files["./simdata/ELMERSOLVER_STARTINFO"], "case.sif");
    Ok(())
}

#[test_log::test]
fn hfss_script_has_ports_endcaps_and_junctions() -> Result<()> {
    let design = pads_and_junction()?;
    let mut hfss = AnsysRenderer::hfss(Options::new());
    hfss.start();
    let request = RenderRequest::default()
        .port("left", "tie", 50.)
        .open_pin("right", "tie");
    let (script, issues) = hfss.build_script(&design, &request)?;
    assert!(issues.is_empty());
    assert_eq!(script.components, ["left", "right", "q"]);

    let subtract = script
        .commands
        .iter()
        .find_map(|c| match c {
            Command::Subtract { blank, tools } if blank == "ground_main_plane" => Some(tools),
            _ => None,
        })
        .unwrap();
    for tool in ["pocket_left", "pocket_right", "pocket_q", "endcap_right_tie", "endcap_left_tie"] {
        assert!(subtract.iter().any(|t| t == tool), "{tool}");
    }

    let rlc = script
        .commands
        .iter()
        .find_map(|c| match c {
            Command::AssignLumpedRlc {
                name,
                object,
                axis,
                inductance,
                capacitance,
                ..
            } => Some((name, object, *axis, inductance, capacitance)),
            _ => None,
        })
        .unwrap();
    assert_eq!(rlc.0, "Lj_Lj_q_jj");
    assert_eq!(rlc.1, "JJ_rect_Lj_q_jj");
    assert_eq!(rlc.2, Axis::X);
    assert_eq!((rlc.3.as_str(), rlc.4.as_str()), ("10nH", "0"));

    let port = script
        .commands
        .iter()
        .find_map(|c| match c {
            Command::DrawRectCorner {
                name,
                corner,
                x_size,
                y_size,
            } if name == "Port_left_tie" => Some((*corner, *x_size, *y_size)),
            _ => None,
        })
        .unwrap();
    assert_relative_eq!(port.0[0], -0.96);
    assert_relative_eq!(port.0[1], -0.005);
    assert_relative_eq!(port.1, 0.006);
    assert_relative_eq!(port.2, 0.01);
    assert!(script.commands.contains(&Command::AssignLumpedPort {
        name: "LumpPort_left_tie".to_string(),
        object: "Port_left_tie".to_string(),
        axis: Axis::X,
        impedance: "50ohm".to_string(),
    }));

    let perfect_e = script
        .commands
        .iter()
        .find_map(|c| match c {
            Command::AssignPerfectE { objects } => Some(objects),
            _ => None,
        })
        .unwrap();
    assert!(perfect_e.iter().any(|o| o == "pad_a_q"));
    assert!(perfect_e.iter().any(|o| o == "ground_main_plane"));
    assert!(!perfect_e.iter().any(|o| o == "pocket_left"));

    let holder = script.commands.iter().find_map(|c| match c {
        Command::DrawBox { name, size, .. } if name == "sample_holder" => Some(*size),
        _ => None,
    });
    assert_relative_eq!(holder.unwrap()[2], 2.54);
    assert!(matches!(
        script.commands.last(),
        Some(Command::AssignMeshLength { name, .. }) if name == "port_mesh"
    ));
    Ok(())
}

#[test_log::test]
fn hfss_turns_junctions_into_ports() -> Result<()> {
    let design = pads_and_junction()?;
    let mut hfss = AnsysRenderer::hfss(Options::new());
    hfss.start();
    let mut request = RenderRequest::default();
    request.jj_to_port.push(("q".into(), "jj".into(), 50., true));
    request.jj_to_port.push(("q".into(), "missing".into(), 50., false));
    let (script, issues) = hfss.build_script(&design, &request)?;

    let rects: Vec<(&str, [f64; 3], f64)> = script
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::DrawRectCorner {
                name,
                corner,
                y_size,
                ..
            } => Some((name.as_str(), *corner, *y_size)),
            _ => None,
        })
        .collect();
    assert_eq!(rects.len(), 2);
    let (port, inductor) = (rects[0], rects[1]);
    assert_eq!(port.0, "Port_q_jj");
    assert_relative_eq!(port.1[1], 1.005);
    assert_relative_eq!(port.2, 0.015);
    assert_eq!(inductor.0, "JJ_rect_Lj_q_jj");
    assert_relative_eq!(inductor.1[1], 0.98);
    assert_relative_eq!(inductor.2, 0.015);

    assert_eq!(issues.len(), 1);
    assert_eq!(
        issues[0].cause(),
        &RenderCause::UnmatchedJunction {
            component: "q".into(),
            element: "missing".into()
        }
    );
    assert_eq!(issues[0].severity(), Severity::Warning);
    Ok(())
}

#[test_log::test]
fn hfss_rejects_a_gap_wider_than_the_junction() -> Result<()> {
    let design = pads_and_junction()?;
    let mut hfss = AnsysRenderer::hfss(Options::new());
    hfss.set_option("port_inductor_gap", "100um");
    hfss.start();
    let mut request = RenderRequest::default();
    request.jj_to_port.push(("q".into(), "jj".into(), 50., true));
    let err = hfss.build_script(&design, &request).unwrap_err();
    assert!(matches!(err, RenderError::InvalidOption { option, .. } if option == "port_inductor_gap"));
    Ok(())
}

#[test_log::test]
fn q3d_uses_thin_conductors_and_skips_junctions() -> Result<()> {
    let design = pads_and_junction()?;
    let mut q3d = AnsysRenderer::q3d(Options::new());
    q3d.start();
    let request = RenderRequest::default().select(["q"]).box_plus_buffer(false);
    let out = q3d.render_design(&design, &request)?;
    let json: serde_json::Value = serde_json::from_str(&out.files["my_design_q3d.json"]).unwrap();
    assert_eq!(json["solution"], "q3d");
    assert_eq!(json["components"], serde_json::json!(["q"]));

    let ops: Vec<&str> = json["commands"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["op"].as_str().unwrap())
        .collect();
    assert!(!ops.contains(&"assign_lumped_rlc"));
    assert!(!json.to_string().contains("sample_holder"));
    assert_eq!(ops.last(), Some(&"auto_identify_nets"));
    let thin = json["commands"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["op"] == "assign_thin_conductor")
        .unwrap();
    assert_eq!(thin["thickness"], "200nm");
    assert_eq!(thin["material"], "pec");

    let ground = json["commands"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "ground_main_plane")
        .unwrap();
    assert_eq!(ground["x_size"], 9.0);
    assert_eq!(ground["y_size"], 6.0);
    Ok(())
}

#[test_log::test]
fn ansys_warns_when_components_leave_the_chip() -> Result<()> {
    let mut design = Design::planar();
    design.add_component("rectangle", Some("edge"), options([("pos_x", "4.4mm")]), true)?;
    let mut hfss = AnsysRenderer::hfss(Options::new());
    hfss.start();
    let out = hfss.render_design(&design, &RenderRequest::default().box_plus_buffer(false))?;
    assert!(out
        .issues
        .iter()
        .any(|i| matches!(i.cause(), RenderCause::ComponentsOutsideChip { chip } if chip == "main")));
    Ok(())
}

#[test_log::test]
fn render_output_writes_nested_files() -> Result<()> {
    let design = two_pads()?;
    let mut elmer = ElmerRenderer::default();
    elmer.start();
    let out = elmer.render_design(&design, &RenderRequest::default())?;
    let dir = std::env::temp_dir().join(format!("metal_render_{}", std::process::id()));
    out.write_to(&dir)?;
    assert!(dir.join("my_design.geo").is_file());
    assert!(dir.join("simdata").join("case.sif").is_file());
    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test_log::test]
fn ansys_keeps_the_size_of_chips_other_than_main() -> Result<()> {
    let mut design = Design::flip_chip();
    design.add_component("pad", Some("qpad"), options([("chip", "Q_chip"), ("layer", "3")]), true)?;
    design.add_component(
        "pad",
        Some("cpad"),
        options([("chip", "C_chip"), ("layer", "1"), ("pos_x", "2mm")]),
        true,
    )?;
    let mut hfss = AnsysRenderer::hfss(Options::new());
    hfss.start();
    let request = RenderRequest::default().select(["qpad"]).box_plus_buffer(true);
    let (script, _) = hfss.build_script(&design, &request)?;

    let size = script
        .commands
        .iter()
        .find_map(|c| match c {
            Command::DrawBox { name, size, .. } if name == "Q_chip" => Some(*size),
            _ => None,
        })
        .unwrap();
    assert_relative_eq!(size[0], 9.0);
    assert_relative_eq!(size[1], 9.0);
    assert_relative_eq!(size[2], 0.28);
    assert!(!script
        .commands
        .iter()
        .any(|c| matches!(c, Command::DrawBox { name, .. } if name == "C_chip")));
    Ok(())
}

#[test_log::test]
fn gmsh_box_grows_past_the_chip_edge() -> Result<()> {
    let mut design = Design::planar();
    design.add_component("rectangle", Some("edge"), options([("pos_x", "4.4mm")]), true)?;
    let mut gmsh = GmshRenderer::default();
    gmsh.start();
    let model = gmsh.build_model(&design, &RenderRequest::default())?;
    assert!(
        model.script.contains("Box(1) = {3.95, -0.35, -0.75, 0.9, 0.7, 0.75};"),
        "{}",
        model.script
    );
    Ok(())
}

#[test_log::test]
fn gmsh_merges_metal_whose_names_clean_alike() -> Result<()> {
    let mut design = Design::planar();
    design.add_component("rectangle", Some("q-1"), Options::new(), true)?;
    design.add_component("rectangle", Some("q1"), options([("pos_y", "1mm")]), true)?;
    let mut gmsh = GmshRenderer::default();
    gmsh.start();
    let model = gmsh.build_model(&design, &RenderRequest::default())?;

    assert_eq!(model.group("q1_rectangle").map(|g| g.dim), Some(2));
    assert_eq!(model.script.matches("Physical Surface(\"q1_rectangle\"").count(), 1);
    assert!(model
        .script
        .contains("Physical Surface(\"q1_rectangle\", 1) = {m0(), m1()};"));
    Ok(())
}

/// Declares only polys but also draws a path.
#[derive(Debug)]
struct Undeclared;

impl ComponentClass for Undeclared {
    fn class_name(&self) -> &'static str {
        "undeclared"
    }

    fn short_name(&self) -> &'static str {
        "und"
    }

    fn default_options(&self) -> Options {
        Options::new()
    }

    fn element_kinds(&self) -> &'static [ElementKind] {
        &[ElementKind::Poly]
    }

    fn make(&self, ctx: &mut MakeContext<'_>) -> Result<()> {
        let rect = Rect::from_center(Point::zero(), 100_000, 100_000);
        ctx.add_qgeometry(ElementKind::Poly, "body", vec![rect.into()], false, false);
        let path = Path::new(vec![Point::zero(), Point::new(200_000, 0)], 10_000);
        ctx.add_qgeometry(ElementKind::Path, "tail", vec![path.into()], false, false);
        Ok(())
    }
}

/// A body with a separate zero-width path beside it.
#[derive(Debug)]
struct BodyWithStub;

impl ComponentClass for BodyWithStub {
    fn class_name(&self) -> &'static str {
        "body_with_stub"
    }

    fn short_name(&self) -> &'static str {
        "stub"
    }

    fn default_options(&self) -> Options {
        Options::new()
    }

    fn element_kinds(&self) -> &'static [ElementKind] {
        &[ElementKind::Poly, ElementKind::Path]
    }

    fn make(&self, ctx: &mut MakeContext<'_>) -> Result<()> {
        let rect = Rect::from_center(Point::zero(), 100_000, 100_000);
        ctx.add_qgeometry(ElementKind::Poly, "body", vec![rect.into()], false, false);
        let stub = Path::new(vec![Point::new(1_000_000, 0), Point::new(2_000_000, 0)], 0);
        ctx.add_qgeometry(ElementKind::Path, "stub", vec![stub.into()], false, false);
        Ok(())
    }
}

#[test_log::test]
fn undeclared_tables_fail_the_build() -> Result<()> {
    let mut design = Design::planar();
    design.registry_mut().register(Arc::new(Undeclared));
    let id = design.add_component("undeclared", Some("u"), Options::new(), true)?;
    assert_eq!(design.component_by_id(id).unwrap().status(), Status::Failed);
    assert!(design.qgeometry().get_component(id).is_empty());
    let last = design.build_log().last().unwrap();
    assert!(last.message.contains("does not declare"), "{}", last.message);
    Ok(())
}

#[test_log::test]
fn elmer_leaves_zero_width_paths_out_of_nets() -> Result<()> {
    let mut design = Design::planar();
    design.registry_mut().register(Arc::new(BodyWithStub));
    let id = design.add_component("body_with_stub", Some("b"), Options::new(), true)?;
    assert_eq!(design.component_by_id(id).unwrap().status(), Status::Good);

    let mut elmer = ElmerRenderer::default();
    elmer.start();
    let nets = elmer.nets(&design, &RenderRequest::default())?;
    assert_eq!(nets.len(), 1);
    assert_eq!(nets[&0], ["b_body"]);

    let out = elmer.render_design(&design, &RenderRequest::default())?;
    assert!(out.files["./simdata/case.sif"].contains("Capacitance Bodies = 1"));
    Ok(())
}

#[test_log::test]
fn render_output_stays_inside_its_directory() -> Result<()> {
    let mut design = two_pads()?;
    design.set_name("../escape");
    let mut gmsh = GmshRenderer::default();
    gmsh.start();
    let out = gmsh.render_design(&design, &RenderRequest::default())?;
    let dir = std::env::temp_dir()
        .join(format!("metal_escape_{}", std::process::id()))
        .join("out");
    let err = out.write_to(&dir).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    assert!(!dir.exists());
    assert!(!dir.parent().unwrap().join("escape.geo").exists());
    Ok(())
}

#[test_log::test]
fn validation_checks_the_net_table() -> Result<()> {
    let mut design = pads_and_junction()?;
    let left = design.find_id("left").unwrap();
    let right = design.find_id("right").unwrap();
    let ghost = ComponentId::from_raw(99);
    let (shared, lone) = (NetId::from_raw(9), NetId::from_raw(10));
    for (net_id, component_id) in [(shared, left), (shared, ghost), (lone, right)] {
        design.net_info.push_raw(NetRow {
            net_id,
            component_id,
            pin_name: "tie".into(),
        });
    }

    let issues = design.validate();
    let causes: Vec<_> = issues.iter().map(|i| i.cause().clone()).collect();
    assert!(causes.contains(&Cause::DanglingNetRow {
        net: shared,
        component: ghost,
        pin: "tie".into(),
    }));
    assert!(causes.contains(&Cause::NetCardinality { net: lone, rows: 1 }));
    assert!(causes.contains(&Cause::PinNetMismatch {
        component: "left".into(),
        pin: "tie".into(),
        pin_net: NetId::UNCONNECTED,
        table_net: shared,
    }));
    assert!(causes.contains(&Cause::PinNetMismatch {
        component: "right".into(),
        pin: "tie".into(),
        pin_net: NetId::UNCONNECTED,
        table_net: lone,
    }));
    assert_eq!(issues.num_errors(), 4);
    Ok(())
}

#[test]
fn flip_chip_has_two_chips_and_a_sample_holder() {
    let design = Design::flip_chip();
    assert_eq!(design.variant(), Variant::FlipChip);
    let names: Vec<String> = design.chip_names().iter().map(ToString::to_string).collect();
    assert_eq!(names, ["C_chip", "Q_chip"]);
    let q = design.chip_dims("Q_chip").unwrap();
    assert_eq!((q.size_x, q.size_y, q.size_z), (9_000_000, 9_000_000, 280_000));
    assert_eq!(q.center_z, 20_000);
    assert_eq!(design.chip_dims("C_chip").unwrap().size_z, -280_000);
    assert_eq!(
        design.get_variable("sample_holder_top"),
        Some(&RawValue::from("890um"))
    );
    let stack_chips = design.layer_stack().get_unique_chip_names();
    let stack_chips: Vec<&str> = stack_chips.iter().map(ArcStr::as_str).collect();
    assert_eq!(stack_chips, ["C_chip", "Q_chip"]);
    assert!(!design.validate().has_error());
}

#[test_log::test]
fn multi_planar_uses_the_given_stack() -> Result<()> {
    let stack = LayerStack::from_path(data("layer_stack.csv"))?;
    let mut design = Design::multi_planar(stack);
    assert_eq!(design.variant(), Variant::MultiPlanar);
    let dims = design.chip_dims("main").unwrap();
    assert_eq!((dims.size_x, dims.size_y), (9_000_000, 7_000_000));
    assert_eq!(design.layer_stack().rows().len(), 3);

    design.add_component("rectangle", Some("top"), options([("layer", "5")]), true)?;
    assert!(design.validate().is_empty());
    Ok(())
}

#[test_log::test]
fn ports_on_connected_pins_warn() -> Result<()> {
    let design = two_pads()?;
    let mut hfss = AnsysRenderer::hfss(Options::new());
    hfss.start();
    let (_, issues) = hfss.build_script(&design, &RenderRequest::default().port("left", "tie", 50.))?;
    let issue = issues
        .iter()
        .find(|i| matches!(i.cause(), RenderCause::PortOnConnectedPin { .. }))
        .unwrap();
    assert_eq!(
        issue.cause(),
        &RenderCause::PortOnConnectedPin {
            component: "left".into(),
            pin: "tie".into()
        }
    );
    assert_eq!(issue.severity(), Severity::Warning);
    Ok(())
}

#[test_log::test]
fn hfss_skips_ignored_junctions_and_warns_on_unknown_ones() -> Result<()> {
    let design = pads_and_junction()?;
    let mut hfss = AnsysRenderer::hfss(Options::new());
    hfss.start();
    let mut request = RenderRequest::default();
    request.ignored_jjs.push(("q".into(), "jj".into()));
    request.ignored_jjs.push(("q".into(), "nope".into()));
    let (script, issues) = hfss.build_script(&design, &request)?;

    assert!(!script
        .commands
        .iter()
        .any(|c| matches!(c, Command::AssignLumpedRlc { .. })));
    assert_eq!(issues.len(), 1);
    assert_eq!(
        issues[0].cause(),
        &RenderCause::UnmatchedJunction {
            component: "q".into(),
            element: "nope".into()
        }
    );
    Ok(())
}

#[test_log::test]
fn routes_reject_missing_pins() -> Result<()> {
    let mut design = two_pads()?;
    design.add_component("pad", Some("third"), options([("pos_y", "1mm")]), true)?;
    let err = design
        .add_component("route_straight", None, pin_inputs(("third", "nope"), ("left", "tie")), true)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::PinInput {
            source: PinInputError::PinDoesNotExist { ref pin, .. },
            ..
        } if pin == "nope"
    ));

    let err = design
        .add_component("route_straight", None, pin_inputs(("third", "tie"), ("left", "tie")), true)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::PinInput {
            source: PinInputError::PinInUse { ref component, .. },
            ..
        } if component == "left"
    ));
    assert_eq!(design.num_components(), 4);
    Ok(())
}

#[test_log::test]
fn chip_layers_and_variables() -> Result<()> {
    let mut design = Design::planar();
    assert_eq!(design.get_chip_layer("main"), Some(0));
    assert_eq!(design.get_chip_layer("moon"), None);

    design.set_variable("cpw_gap", "8um");
    assert_eq!(design.delete_variable("cpw_gap"), Some(RawValue::from("8um")));
    assert_eq!(design.get_variable("cpw_gap"), None);
    assert_eq!(design.delete_variable("cpw_gap"), None);
    Ok(())
}

#[test_log::test]
fn geometry_lists_filter_by_table() -> Result<()> {
    let design = pads_and_junction()?;
    let tables = design.qgeometry();
    assert_eq!(tables.get_element_types(), ElementKind::ALL);

    let q = design.find_id("q").unwrap();
    assert_eq!(tables.get_component_geometry_list(q, Some(ElementKind::Junction)).len(), 1);
    assert_eq!(tables.get_component_geometry_list(q, Some(ElementKind::Path)).len(), 0);
    let left = design.find_id("left").unwrap();
    assert_eq!(tables.get_component_geometry_list(left, Some(ElementKind::Poly)).len(), 2);
    assert_eq!(tables.get_component_geometry_list(left, None).len(), 2);
    Ok(())
}

#[test_log::test]
fn gmsh_draws_every_design_chip() -> Result<()> {
    let mut design = Design::flip_chip();
    design.add_component("pad", Some("qpad"), options([("chip", "Q_chip"), ("layer", "3")]), true)?;
    let mut gmsh = GmshRenderer::default();
    gmsh.start();
    let model = gmsh.build_model(&design, &RenderRequest::default())?;
    assert!(model.script.contains("// chip C_chip"));
    assert!(model.script.contains("// chip Q_chip"));
    assert!(model.script.contains("Physical Surface(\"ground_plane\", 2) = {gnd0(), gnd1()};"));
    Ok(())
}
