use approx::assert_relative_eq;
use geometry::prelude::*;

use super::library::builtins;
use super::pin::PinInputError;
use super::*;
use crate::design::Design;
use crate::error::Error;
use crate::id::NetId;
use crate::parse::RawValue;

fn route(start: (&str, &str), end: (&str, &str)) -> Options {
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

#[test]
fn registry_holds_builtins() {
    let registry = ClassRegistry::default();
    let names: Vec<_> = registry.names().map(ArcStr::as_str).collect();
    assert_eq!(
        names,
        ["rectangle", "polygon", "pad", "junction", "route_straight"]
    );
    assert_eq!(builtins().len(), names.len());
    assert!(matches!(
        registry.get("transmon"),
        Err(Error::UnknownClass(name)) if name == "transmon"
    ));
}

#[test]
fn template_layers_class_defaults_over_common_options() {
    let pad = library::Pad;
    let template = pad.template_options();
    for key in ["pos_x", "pos_y", "orientation", "chip", "layer", "pad_gap"] {
        assert!(template.contains_key(key), "missing `{key}`");
    }
    assert_eq!(template["lead_width"], RawValue::from("cpw_width"));
}

#[test_log::test]
fn pad_pin_points_out_of_the_pad() -> crate::Result<()> {
    let mut design = Design::planar();
    let id = design.add_component("pad", Some("p"), Options::new(), true)?;
    let pad = design.component_by_id(id).unwrap();
    assert_eq!(pad.status(), Status::Good);
    assert!(pad.made());

    let tie = pad.pin("tie").unwrap();
    assert_eq!(tie.middle, Point::new(40_000, 0));
    assert_eq!(tie.width, 10_000);
    assert_eq!(tie.gap, 6_000);
    assert_relative_eq!(tie.normal.x, 1.);
    assert_relative_eq!(tie.normal.y, 0.);
    assert_eq!(tie.net_id, NetId::UNCONNECTED);

    let rows = design.qgeometry().get_component(id);
    let names: Vec<_> = rows.iter().map(|(_, row)| row.name.as_str()).collect();
    assert_eq!(names, ["pad", "pocket"]);
    assert!(rows.iter().any(|(_, row)| row.subtract));
    Ok(())
}

#[test_log::test]
fn placement_rotates_then_translates() -> crate::Result<()> {
    let mut design = Design::planar();
    let overrides = options([("pos_x", "1mm"), ("orientation", "90")]);
    let id = design.add_component("pad", Some("p"), overrides, true)?;
    let tie = design.component_by_id(id).unwrap().pin("tie").unwrap();
    assert_eq!(tie.middle, Point::new(1_000_000, 40_000));
    assert_relative_eq!(tie.normal.x, 0., epsilon = 1e-9);
    assert_relative_eq!(tie.normal.y, 1., epsilon = 1e-9);
    Ok(())
}

#[test_log::test]
fn junction_has_outward_pins_on_both_pads() -> crate::Result<()> {
    let mut design = Design::planar();
    let id = design.add_component("junction", None, Options::new(), true)?;
    let jj = design.component_by_id(id).unwrap();
    assert_eq!(jj.name(), "jj_1");

    let (a, b) = (jj.pin("a").unwrap(), jj.pin("b").unwrap());
    assert_eq!(a.middle, Point::new(-25_000, 0));
    assert_eq!(b.middle, Point::new(25_000, 0));
    assert_relative_eq!(a.normal.x, -1.);
    assert_relative_eq!(b.normal.x, 1.);

    let junctions = design.qgeometry().rows(ElementKind::Junction);
    assert_eq!(junctions.len(), 1);
    assert_eq!(junctions[0].width(), Some(1_000));
    Ok(())
}

#[test_log::test]
fn failed_make_keeps_the_component() -> crate::Result<()> {
    let mut design = Design::planar();
    let overrides = options([("pad_height", "5um")]);
    let id = design.add_component("pad", Some("narrow"), overrides, true)?;
    let pad = design.component_by_id(id).unwrap();
    assert_eq!(pad.status(), Status::Failed);
    assert!(!pad.made());
    assert!(pad.pins().is_empty());
    assert!(design.qgeometry().get_component(id).is_empty());

    let last = design.build_log().last().unwrap();
    assert!(last.message.contains("lead_width"), "{}", last.message);
    Ok(())
}

#[test_log::test]
fn bad_option_type_fails_the_build() -> crate::Result<()> {
    let mut design = Design::planar();
    let id = design.add_component("rectangle", None, options([("width", "wide")]), true)?;
    assert_eq!(design.component_by_id(id).unwrap().status(), Status::Failed);
    Ok(())
}

#[test_log::test]
fn route_connects_its_pins() -> crate::Result<()> {
    let mut design = Design::planar();
    design.add_component("pad", Some("left"), options([("pos_x", "-1mm")]), true)?;
    design.add_component(
        "pad",
        Some("right"),
        options([("pos_x", "1mm"), ("orientation", "180")]),
        true,
    )?;
    let id = design.add_component(
        "route_straight",
        Some("cpw"),
        route(("left", "tie"), ("right", "tie")),
        true,
    )?;

    let cpw = design.component_by_id(id).unwrap();
    assert_eq!(cpw.status(), Status::Good);
    let start = cpw.pin("start").unwrap();
    assert!(start.is_connected());
    let left = design.component("left").unwrap().pin("tie").unwrap();
    assert_eq!(left.net_id, start.net_id);
    assert_eq!(design.net_info().net_ids().len(), 2);

    let paths = design.qgeometry().rows(ElementKind::Path);
    let trace = paths.iter().find(|row| row.name == "trace").unwrap();
    assert_eq!(trace.width(), Some(10_000));
    let cut = paths.iter().find(|row| row.name == "cut").unwrap();
    assert!(cut.subtract);
    assert_eq!(cut.width(), Some(22_000));
    Ok(())
}

#[test_log::test]
fn route_rejects_pins_in_use() -> crate::Result<()> {
    let mut design = Design::planar();
    design.add_component("pad", Some("a"), Options::new(), true)?;
    design.add_component("pad", Some("b"), options([("pos_x", "1mm")]), true)?;
    design.add_component("route_straight", None, route(("a", "tie"), ("b", "tie")), true)?;

    let err = design
        .add_component("route_straight", None, route(("a", "tie"), ("b", "tie")), true)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::PinInput {
            source: PinInputError::PinInUse { .. },
            ..
        }
    ));

    design.add_component("pad", Some("d"), options([("pos_y", "1mm")]), true)?;
    let err = design
        .add_component("route_straight", None, route(("d", "tie"), ("c", "tie")), true)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::PinInput {
            source: PinInputError::ComponentDoesNotExist { .. },
            ..
        }
    ));
    Ok(())
}
