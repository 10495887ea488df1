//! Built-in component classes.
//!
//! Just enough to author and render designs: plain shapes, a launch pad, a
//! junction between two pads and a straight route between existing pins.

use std::sync::Arc;

use geometry::prelude::*;

use crate::error::Result;
use crate::parse::{options, Options, RawValue};
use crate::qgeometry::ElementKind;

use super::{ComponentClass, MakeContext};

/// Every built-in class.
pub fn builtins() -> Vec<Arc<dyn ComponentClass>> {
    vec![
        Arc::new(Rectangle),
        Arc::new(PolygonClass),
        Arc::new(Pad),
        Arc::new(Junction),
        Arc::new(RouteStraight),
    ]
}

/// A rectangle centered on the component origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rectangle;

impl ComponentClass for Rectangle {
    fn class_name(&self) -> &'static str {
        "rectangle"
    }

    fn short_name(&self) -> &'static str {
        "rect"
    }

    fn default_options(&self) -> Options {
        options([
            ("width", "500um"),
            ("height", "300um"),
            ("subtract", "False"),
            ("helper", "False"),
        ])
    }

    fn element_kinds(&self) -> &'static [ElementKind] {
        &[ElementKind::Poly]
    }

    fn make(&self, ctx: &mut MakeContext<'_>) -> Result<()> {
        let rect = Rect::from_center(Point::zero(), ctx.length("width")?, ctx.length("height")?);
        let (subtract, helper) = (ctx.flag("subtract")?, ctx.flag("helper")?);
        ctx.add_qgeometry(ElementKind::Poly, "rectangle", vec![rect.into()], subtract, helper);
        Ok(())
    }
}

/// A polygon through the points of the `points` option.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolygonClass;

impl ComponentClass for PolygonClass {
    fn class_name(&self) -> &'static str {
        "polygon"
    }

    fn short_name(&self) -> &'static str {
        "poly"
    }

    fn default_options(&self) -> Options {
        let mut opts = options([("subtract", "False"), ("helper", "False")]);
        opts.insert(
            "points".into(),
            RawValue::from(vec![
                RawValue::from(vec!["0um", "0um"]),
                RawValue::from(vec!["100um", "0um"]),
                RawValue::from(vec!["0um", "100um"]),
            ]),
        );
        opts
    }

    fn element_kinds(&self) -> &'static [ElementKind] {
        &[ElementKind::Poly]
    }

    fn make(&self, ctx: &mut MakeContext<'_>) -> Result<()> {
        let points = ctx.points("points")?;
        if points.len() < 3 {
            return Err(ctx.fail(format!("a polygon needs 3 points, got {}", points.len())));
        }
        let (subtract, helper) = (ctx.flag("subtract")?, ctx.flag("helper")?);
        ctx.add_qgeometry(
            ElementKind::Poly,
            "polygon",
            vec![Polygon::from_verts(points).into()],
            subtract,
            helper,
        );
        Ok(())
    }
}

/// A launch pad with a ground pocket and a `tie` pin on its +x edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pad;

impl ComponentClass for Pad {
    fn class_name(&self) -> &'static str {
        "pad"
    }

    fn short_name(&self) -> &'static str {
        "pad"
    }

    fn default_options(&self) -> Options {
        options([
            ("pad_width", "80um"),
            ("pad_height", "80um"),
            ("pad_gap", "58um"),
            ("lead_width", "cpw_width"),
            ("lead_gap", "cpw_gap"),
        ])
    }

    fn element_kinds(&self) -> &'static [ElementKind] {
        &[ElementKind::Poly]
    }

    fn make(&self, ctx: &mut MakeContext<'_>) -> Result<()> {
        let (w, h) = (ctx.length("pad_width")?, ctx.length("pad_height")?);
        let gap = ctx.length("pad_gap")?;
        let (lw, lg) = (ctx.length("lead_width")?, ctx.length("lead_gap")?);
        if lw > h {
            return Err(ctx.fail("lead_width is wider than the pad"));
        }

        let pad = Rect::from_center(Point::zero(), w, h);
        ctx.add_qgeometry(ElementKind::Poly, "pad", vec![pad.into()], false, false);
        ctx.add_qgeometry(
            ElementKind::Poly,
            "pocket",
            vec![pad.expand_all(gap).into()],
            true,
            false,
        );
        ctx.add_pin(
            "tie",
            [Point::new(w / 2, lw / 2), Point::new(w / 2, -lw / 2)],
            lw,
            false,
            Some(lg),
        )?;
        Ok(())
    }
}

/// Two pads joined by a junction line, with pins `a` and `b` on the outer
/// pad edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct Junction;

impl ComponentClass for Junction {
    fn class_name(&self) -> &'static str {
        "junction"
    }

    fn short_name(&self) -> &'static str {
        "jj"
    }

    fn default_options(&self) -> Options {
        options([
            ("pad_width", "20um"),
            ("pad_height", "20um"),
            ("pad_spacing", "10um"),
            ("jj_width", "1um"),
            ("pocket_gap", "20um"),
            ("lead_width", "cpw_width"),
        ])
    }

    fn element_kinds(&self) -> &'static [ElementKind] {
        &[ElementKind::Poly, ElementKind::Junction]
    }

    fn make(&self, ctx: &mut MakeContext<'_>) -> Result<()> {
        let (w, h) = (ctx.length("pad_width")?, ctx.length("pad_height")?);
        let s = ctx.length("pad_spacing")?;
        let jj_width = ctx.length("jj_width")?;
        let gap = ctx.length("pocket_gap")?;
        let lw = ctx.length("lead_width")?;
        if s <= 0 {
            return Err(ctx.fail("pad_spacing must be positive"));
        }

        let (xl, xr) = (-(s / 2 + w), s / 2 + w);
        let pad_a = Rect::from_sides(xl, -h / 2, -s / 2, h / 2);
        let pad_b = Rect::from_sides(s / 2, -h / 2, xr, h / 2);
        ctx.add_qgeometry(ElementKind::Poly, "pad_a", vec![pad_a.into()], false, false);
        ctx.add_qgeometry(ElementKind::Poly, "pad_b", vec![pad_b.into()], false, false);
        ctx.add_qgeometry(
            ElementKind::Junction,
            "jj",
            vec![Path::new(vec![Point::new(-s / 2, 0), Point::new(s / 2, 0)], jj_width).into()],
            false,
            false,
        );
        ctx.add_qgeometry(
            ElementKind::Poly,
            "pocket",
            vec![pad_a.union(pad_b).expand_all(gap).into()],
            true,
            false,
        );

        ctx.add_pin(
            "a",
            [Point::new(xl, -lw / 2), Point::new(xl, lw / 2)],
            lw,
            false,
            None,
        )?;
        ctx.add_pin(
            "b",
            [Point::new(xr, lw / 2), Point::new(xr, -lw / 2)],
            lw,
            false,
            None,
        )?;
        Ok(())
    }
}

/// A straight trace between the pins named by `pin_inputs.start_pin` and
/// `pin_inputs.end_pin`.
///
/// The route owns pins `start` and `end` and connects each to the pin it
/// starts or ends on.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteStraight;

impl ComponentClass for RouteStraight {
    fn class_name(&self) -> &'static str {
        "route_straight"
    }

    fn short_name(&self) -> &'static str {
        "route"
    }

    fn default_options(&self) -> Options {
        let unset = || options([("component", ""), ("pin", "")]);
        let mut opts = options([("trace_width", "cpw_width"), ("trace_gap", "cpw_gap")]);
        opts.insert(
            "pin_inputs".into(),
            RawValue::Table(options([("start_pin", unset()), ("end_pin", unset())])),
        );
        opts
    }

    fn element_kinds(&self) -> &'static [ElementKind] {
        &[ElementKind::Path]
    }

    fn make(&self, ctx: &mut MakeContext<'_>) -> Result<()> {
        ctx.set_transformation(Transformation::identity());
        let (w, gap) = (ctx.length("trace_width")?, ctx.length("trace_gap")?);
        let (start_comp, start) = ctx.pin_input("start_pin")?;
        let (end_comp, end) = ctx.pin_input("end_pin")?;
        let (a, b) = (start.middle, end.middle);
        let Some(dir) = (b - a).to_vec2().unit() else {
            return Err(ctx.fail("start and end pins coincide"));
        };

        ctx.add_qgeometry(
            ElementKind::Path,
            "trace",
            vec![Path::new(vec![a, b], w).into()],
            false,
            false,
        );
        ctx.add_qgeometry(
            ElementKind::Path,
            "cut",
            vec![Path::new(vec![a, b], w + 2 * gap).into()],
            true,
            false,
        );

        let step = dir * w as f64;
        ctx.add_pin("start", [a.offset(step), a], w, true, Some(gap))?;
        ctx.add_pin("end", [b.offset(-step), b], w, true, Some(gap))?;
        ctx.connect("start", start_comp, start.name.clone());
        ctx.connect("end", end_comp, end.name.clone());
        Ok(())
    }
}
