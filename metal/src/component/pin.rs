//! Component pins and `pin_inputs` validation.

use arcstr::ArcStr;
use geometry::prelude::*;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::id::{ComponentId, NetId};
use crate::parse::{Options, RawValue};

use super::Component;

/// The gap of a pin relative to its width when no gap is given.
pub const DEFAULT_GAP_RATIO: f64 = 0.6;

/// A connection point on a component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pin {
    /// The pin name, unique within its component.
    pub name: ArcStr,
    /// The two ends of the pin edge.
    pub points: [Point; 2],
    /// The center of the pin edge.
    pub middle: Point,
    /// Unit vector pointing out of the component.
    pub normal: Vec2,
    /// Unit vector along the pin edge.
    pub tangent: Vec2,
    /// The pin width.
    pub width: i64,
    /// The ground gap next to the pin.
    pub gap: i64,
    /// The chip the pin is on.
    pub chip: ArcStr,
    /// The component owning the pin.
    pub parent: ComponentId,
    /// The net the pin is on, or [`NetId::UNCONNECTED`].
    pub net_id: NetId,
    /// Reserved for length-limited routing. Always zero.
    pub length: i64,
}

impl Pin {
    /// Creates a pin from two points.
    ///
    /// Without `input_as_norm`, `points` are the ends of the pin edge: the
    /// tangent runs from the first to the second point, the normal is the
    /// tangent rotated by +90 degrees and the width is the distance between
    /// the points.
    ///
    /// With `input_as_norm`, `points` are the tail and head of the normal.
    /// The pin edge is centered on the head with the given `width`.
    ///
    /// `gap` defaults to 0.6 times the width.
    pub fn new(
        name: impl Into<ArcStr>,
        points: [Point; 2],
        width: i64,
        input_as_norm: bool,
        chip: impl Into<ArcStr>,
        gap: Option<i64>,
        parent: ComponentId,
    ) -> Result<Self> {
        let name = name.into();
        let [p0, p1] = points;
        let Some(dir) = (p1 - p0).to_vec2().unit() else {
            return Err(Error::DegeneratePin { pin: name });
        };

        let (points, middle, normal, tangent, width) = if input_as_norm {
            let normal = dir;
            let half = width as f64 / 2.;
            let s = p1.offset(normal.rot90() * half);
            let e = p1.offset(normal.rot270() * half);
            ([s, e], p1, normal, normal.rot90(), width)
        } else {
            let width = p0.distance(p1).round() as i64;
            ([p0, p1], p0.midpoint(p1), dir.rot90(), dir, width)
        };

        Ok(Self {
            name,
            points,
            middle,
            normal: normal.round_to(12),
            tangent: tangent.round_to(12),
            width,
            gap: gap.unwrap_or_else(|| (width as f64 * DEFAULT_GAP_RATIO).round() as i64),
            chip: chip.into(),
            parent,
            net_id: NetId::UNCONNECTED,
            length: 0,
        })
    }

    /// Returns `true` if the pin is on a net.
    pub fn is_connected(&self) -> bool {
        !self.net_id.is_zero()
    }
}

/// A failed `pin_inputs` check.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PinInputError {
    /// The referenced component does not exist.
    #[error("Component Does Not Exist: `{component}` (input `{input}`)")]
    ComponentDoesNotExist {
        /// The `pin_inputs` key.
        input: ArcStr,
        /// The missing component.
        component: ArcStr,
    },
    /// The referenced component has no such pin.
    #[error("Pin Does Not Exist: `{component}.{pin}` (input `{input}`)")]
    PinDoesNotExist {
        /// The `pin_inputs` key.
        input: ArcStr,
        /// The component.
        component: ArcStr,
        /// The missing pin.
        pin: ArcStr,
    },
    /// The referenced pin is already on a net.
    #[error("Pin In Use: `{component}.{pin}` is on net {net} (input `{input}`)")]
    PinInUse {
        /// The `pin_inputs` key.
        input: ArcStr,
        /// The component.
        component: ArcStr,
        /// The pin.
        pin: ArcStr,
        /// The net the pin is on.
        net: NetId,
    },
    /// A `pin_inputs` entry is not a `{ component, pin }` table.
    #[error("pin input `{input}` must be a table with `component` and `pin` keys")]
    Malformed {
        /// The `pin_inputs` key.
        input: ArcStr,
    },
}

/// A resolved `pin_inputs` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinInput {
    /// The `pin_inputs` key, e.g. `start_pin`.
    pub input: ArcStr,
    /// The referenced component.
    pub component: ArcStr,
    /// The referenced pin.
    pub pin: ArcStr,
}

/// Reads the `pin_inputs` table of a component's options.
///
/// Entries whose component is empty are unset and skipped.
pub fn pin_inputs(options: &Options) -> Result<Vec<PinInput>, PinInputError> {
    let Some(RawValue::Table(inputs)) = options.get("pin_inputs") else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for (input, entry) in inputs {
        let malformed = || PinInputError::Malformed {
            input: input.clone(),
        };
        let table = entry.as_table().ok_or_else(malformed)?;
        let component = table
            .get("component")
            .and_then(RawValue::as_text)
            .ok_or_else(malformed)?;
        let pin = table
            .get("pin")
            .and_then(RawValue::as_text)
            .ok_or_else(malformed)?;
        if component.is_empty() {
            continue;
        }
        out.push(PinInput {
            input: input.clone(),
            component: component.clone(),
            pin: pin.clone(),
        });
    }
    Ok(out)
}

/// Checks that every `pin_inputs` entry names an existing, unconnected pin.
pub fn check_pin_inputs<'a>(
    options: &Options,
    lookup: impl Fn(&str) -> Option<&'a Component>,
) -> Result<Vec<PinInput>, PinInputError> {
    let inputs = pin_inputs(options)?;
    for PinInput {
        input,
        component,
        pin,
    } in &inputs
    {
        let comp = lookup(component).ok_or_else(|| PinInputError::ComponentDoesNotExist {
            input: input.clone(),
            component: component.clone(),
        })?;
        let p = comp
            .pins()
            .get(pin)
            .ok_or_else(|| PinInputError::PinDoesNotExist {
                input: input.clone(),
                component: component.clone(),
                pin: pin.clone(),
            })?;
        if p.is_connected() {
            return Err(PinInputError::PinInUse {
                input: input.clone(),
                component: component.clone(),
                pin: pin.clone(),
                net: p.net_id,
            });
        }
    }
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn pin_from_edge_points() {
        let pin = Pin::new(
            "tie",
            [Point::new(100, 5), Point::new(100, -5)],
            0,
            false,
            "main",
            None,
            ComponentId::from_raw(1),
        )
        .unwrap();
        assert_eq!(pin.width, 10);
        assert_eq!(pin.gap, 6);
        assert_eq!(pin.middle, Point::new(100, 0));
        assert_relative_eq!(pin.normal.x, 1.);
        assert_relative_eq!(pin.normal.y, 0.);
        assert_relative_eq!(pin.tangent.y, -1.);
        assert!(!pin.is_connected());
    }

    #[test]
    fn pin_from_normal() {
        let pin = Pin::new(
            "start",
            [Point::new(0, 100), Point::new(0, 0)],
            20,
            true,
            "main",
            Some(12),
            ComponentId::from_raw(1),
        )
        .unwrap();
        assert_eq!(pin.middle, Point::new(0, 0));
        assert_eq!(pin.width, 20);
        assert_eq!(pin.gap, 12);
        assert_relative_eq!(pin.normal.y, -1.);
        assert_eq!(pin.points, [Point::new(10, 0), Point::new(-10, 0)]);
        assert_relative_eq!(pin.tangent.x, 1.);
    }

    #[test]
    fn coincident_points_are_rejected() {
        let err = Pin::new(
            "bad",
            [Point::new(3, 3), Point::new(3, 3)],
            1,
            false,
            "main",
            None,
            ComponentId::from_raw(1),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DegeneratePin { .. }));
    }
}
